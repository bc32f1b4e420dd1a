//! JSON修復モジュール
//!
//! モデル出力に含まれる「JSONもどき」を順に修復する。
//! 各修復は引用符を意識した走査で行い、文字列の中身は壊さない。
//! どの修復も冪等で、`repair_json` を2回適用しても結果は変わらない。

/// 修復を既定の順序ですべて適用
///
/// 1. スマートクォートを通常の引用符に
/// 2. `//` `/* */` コメントを削除
/// 3. シングルクォート文字列をダブルクォートに
/// 4. クォートされていないキーをクォート
/// 5. `}` `]` 直前の末尾カンマを削除
/// 6. 文字列内の制御文字・括弧をエスケープ
///
/// # Examples
/// ```
/// use ui_refine_common::repair::repair_json;
///
/// let fixed = repair_json("{type: 'button',}");
/// assert_eq!(fixed, r#"{"type": "button"}"#);
/// ```
pub fn repair_json(text: &str) -> String {
    let text = normalize_smart_quotes(text);
    let text = strip_comments(&text);
    let text = convert_single_quotes(&text);
    let text = quote_unquoted_keys(&text);
    let text = remove_trailing_commas(&text);
    escape_string_contents(&text)
}

/// スマートクォート（“ ” ‘ ’ など）を `"` `'` に置換
pub fn normalize_smart_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

/// 文字列外の `//` 行コメントと `/* */` ブロックコメントを削除
///
/// ここではシングルクォート文字列もまだ文字列として扱う（'http://...' を守るため）。
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 2;
                    continue;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// シングルクォート文字列をダブルクォート文字列に変換
///
/// 中の `"` はエスケープし、`\'` は `'` に戻す。閉じていない `'` はそのまま残す。
pub fn convert_single_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 2;
                    continue;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '\'' => match find_closing_single_quote(&chars, i + 1) {
                Some(end) => {
                    out.push('"');
                    let mut j = i + 1;
                    while j < end {
                        match chars[j] {
                            '\\' if chars.get(j + 1) == Some(&'\'') => {
                                out.push('\'');
                                j += 2;
                            }
                            '\\' => {
                                out.push('\\');
                                if let Some(&next) = chars.get(j + 1) {
                                    out.push(next);
                                }
                                j += 2;
                            }
                            '"' => {
                                out.push_str("\\\"");
                                j += 1;
                            }
                            other => {
                                out.push(other);
                                j += 1;
                            }
                        }
                    }
                    out.push('"');
                    i = end + 1;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn find_closing_single_quote(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\'' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

/// `{` または `,` の直後にあるクォートなしキーを `"key"` にする
pub fn quote_unquoted_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut last_significant: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 2;
                    continue;
                }
            } else if c == '"' {
                in_string = false;
                last_significant = Some('"');
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }

        if is_ident_start(c) && matches!(last_significant, Some('{') | Some(',')) {
            let start = i;
            let mut end = i;
            while end < chars.len() && is_ident_char(chars[end]) {
                end += 1;
            }
            let mut look = end;
            while look < chars.len() && chars[look].is_whitespace() {
                look += 1;
            }

            if chars.get(look) == Some(&':') {
                out.push('"');
                out.extend(&chars[start..end]);
                out.push('"');
                last_significant = Some('"');
            } else {
                out.extend(&chars[start..end]);
                last_significant = Some(chars[end - 1]);
            }
            i = end;
            continue;
        }

        if !c.is_whitespace() {
            last_significant = Some(c);
        }
        out.push(c);
        i += 1;
    }

    out
}

/// `}` `]` の直前にある末尾カンマを削除（連続カンマもまとめて削除）
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 2;
                    continue;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let mut look = i + 1;
            while look < chars.len() && (chars[look].is_whitespace() || chars[look] == ',') {
                look += 1;
            }
            if matches!(chars.get(look), Some('}') | Some(']')) {
                i += 1;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out
}

/// 文字列内の生の制御文字と `{` `}` `[` `]` をエスケープ
///
/// 括弧は `\u007b` などのエスケープに置き換えるので、パース後の値は元の文字に戻る。
pub fn escape_string_contents(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '{' => out.push_str("\\u007b"),
            '}' => out.push_str("\\u007d"),
            '[' => out.push_str("\\u005b"),
            ']' => out.push_str("\\u005d"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            other => out.push(other),
        }
        i += 1;
    }

    out
}
