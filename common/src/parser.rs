//! モデル出力パーサー
//!
//! 生成モデルのレスポンスから構造化ペイロードを取り出す。
//! 失敗してもエラーは返さず、段階的に緩い方法へ切り替えて
//! 最後は「項目なし」のフォールバックを返す。

use crate::error::{Error, Result};
use crate::repair::repair_json;
use crate::strategy::first_success;
use regex::Regex;
use serde_json::Value;

/// 期待するペイロードの形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadShape {
    /// 項目配列のキー（例: "components"）
    pub array_key: &'static str,
    /// 各項目が必ず持つキー（例: "type"）
    pub item_key: &'static str,
}

/// コンポーネント抽出レスポンスの形
pub const COMPONENTS_SHAPE: PayloadShape = PayloadShape {
    array_key: "components",
    item_key: "type",
};

/// 改善提案レスポンスの形
pub const IMPROVEMENTS_SHAPE: PayloadShape = PayloadShape {
    array_key: "improvements",
    item_key: "componentId",
};

/// 項目を取り出せた方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMethod {
    /// ペイロード全体をパース
    Document,
    /// 名前付き配列だけをパース
    SubArray,
    /// 項目らしい断片を個別にパース
    Fragments,
    /// 何も取り出せなかった
    Fallback,
}

/// 復元結果
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredPayload {
    /// 取り出せた項目（オブジェクトのみ）
    pub items: Vec<Value>,
    /// 全体のパースに成功した場合のドキュメント
    pub document: Option<Value>,
    pub method: RecoveryMethod,
}

impl RecoveredPayload {
    pub fn is_fallback(&self) -> bool {
        self.method == RecoveryMethod::Fallback
    }
}

/// レスポンスからペイロード部分を抽出
///
/// 抽出優先順位:
/// 1. ``` ... ``` フェンスブロック（言語タグは無視）
/// 2. 最初の `{` または `[` から始まる対応の取れた範囲
/// 3. エラー
///
/// 対応が取れないまま終わった場合は開始位置から末尾までを返す。
///
/// # Examples
/// ```
/// use ui_refine_common::extract_payload;
///
/// let response = "Here you go: {\"components\": []} Hope it helps.";
/// assert_eq!(extract_payload(response).unwrap(), "{\"components\": []}");
/// ```
pub fn extract_payload(response: &str) -> Result<&str> {
    if let Some(fence) = response.find("```") {
        let after_fence = fence + 3;
        // 言語タグの行を読み飛ばす
        let body_start = response[after_fence..]
            .find('\n')
            .map(|offset| after_fence + offset + 1)
            .unwrap_or(after_fence);
        let body = match response[body_start..].find("```") {
            Some(end) => &response[body_start..body_start + end],
            None => &response[body_start..],
        };
        let body = body.trim();
        if !body.is_empty() {
            return Ok(body);
        }
    }

    if let Some(start) = response.find(['{', '[']) {
        return Ok(match find_balanced_end(response, start) {
            Some(end) => &response[start..=end],
            None => response[start..].trim_end(),
        });
    }

    Err(Error::Parse("構造化ペイロードが見つかりません".into()))
}

/// `start` の開き括弧に対応する閉じ括弧の位置（バイト位置）
///
/// 引用符（" と '）の中の括弧は数えない。
pub fn find_balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// そのままパース、だめなら修復してからパース
pub fn parse_lenient(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim())
        .ok()
        .or_else(|| serde_json::from_str(repair_json(text).trim()).ok())
}

/// レスポンスから項目を復元する
///
/// 1. ペイロードを抽出・修復してパース
/// 2. 名前付き配列（`"components": [...]`）だけを切り出してパース
/// 3. `item_key` を持つオブジェクト断片を個別にパース
/// 4. どれも空ならフォールバック
pub fn recover_payload(response: &str, shape: PayloadShape) -> RecoveredPayload {
    let document = extract_payload(response).ok().and_then(parse_lenient);

    let strategies = [
        RecoveryMethod::Document,
        RecoveryMethod::SubArray,
        RecoveryMethod::Fragments,
    ];

    let recovered = first_success(strategies, |method| {
        let items = match method {
            RecoveryMethod::Document => document.as_ref().map(|doc| items_from_document(doc, shape))?,
            RecoveryMethod::SubArray => sub_array_items(response, shape)?,
            RecoveryMethod::Fragments => fragment_items(response, shape),
            RecoveryMethod::Fallback => return None,
        };
        (!items.is_empty()).then_some(items)
    });

    match recovered {
        Some((method, items)) => {
            log::debug!("ペイロード復元: {:?} ({}件)", method, items.len());
            RecoveredPayload { items, document, method }
        }
        None => {
            log::debug!("ペイロード復元: 項目なし（フォールバック）");
            RecoveredPayload {
                items: Vec::new(),
                document,
                method: RecoveryMethod::Fallback,
            }
        }
    }
}

/// パース済みドキュメントから項目を取り出す
fn items_from_document(document: &Value, shape: PayloadShape) -> Vec<Value> {
    match document {
        Value::Array(items) => objects_only(items),
        Value::Object(map) => match map.get(shape.array_key) {
            Some(Value::Array(items)) => objects_only(items),
            _ if map.contains_key(shape.item_key) => vec![document.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn objects_only(items: &[Value]) -> Vec<Value> {
    items.iter().filter(|v| v.is_object()).cloned().collect()
}

/// `"array_key": [ ... ]` の部分だけを切り出してパース
fn sub_array_items(response: &str, shape: PayloadShape) -> Option<Vec<Value>> {
    let pattern = format!(r#"["']?{}["']?\s*:\s*\["#, regex::escape(shape.array_key));
    let re = Regex::new(&pattern).ok()?;

    let items = re.find_iter(response).find_map(|m| {
        let open = m.end() - 1;
        let end = find_balanced_end(response, open)?;
        match parse_lenient(&response[open..=end]) {
            Some(Value::Array(items)) => Some(objects_only(&items)),
            _ => None,
        }
    });
    items
}

/// `item_key` を持つオブジェクト断片を探して個別にパース
///
/// 各 `{` から対応の閉じ括弧までを1断片とし、パースできて
/// `item_key` を持つものだけ採用する。採用した断片の内側は読み飛ばす。
fn fragment_items(response: &str, shape: PayloadShape) -> Vec<Value> {
    let mut items = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = response[cursor..].find('{') {
        let start = cursor + offset;
        let accepted = find_balanced_end(response, start).and_then(|end| {
            match parse_lenient(&response[start..=end]) {
                Some(value @ Value::Object(_)) if value.get(shape.item_key).is_some() => Some((value, end)),
                _ => None,
            }
        });

        match accepted {
            Some((value, end)) => {
                items.push(value);
                cursor = end + 1;
            }
            None => cursor = start + 1,
        }
    }

    items
}
