/// 从原始消息文本中解析出的指令
#[derive(Debug, PartialEq)]
pub struct ParsedCommand<'a> {
    /// 指令关键字（已去掉前缀并转为小写）
    pub keyword: String,
    /// 关键字之后的剩余内容（已去除首部空白）
    pub content: &'a str,
}

/// 解析指令：匹配 [Prefix][Keyword] [Content]。
/// 关键字为第一个空白分隔的 Token，大小写不敏感；未命中任何前缀时返回 None。
pub fn parse_command<'a>(prefixes: &[String], raw: &'a str) -> Option<ParsedCommand<'a>> {
    let text = raw.trim_start();

    for prefix in prefixes {
        if prefix.is_empty() {
            continue;
        }
        if let Some(rest) = text.strip_prefix(prefix.as_str()) {
            let rest = rest.trim_start();
            if rest.is_empty() {
                return None;
            }

            let (keyword, content) = match rest.split_once(char::is_whitespace) {
                Some((kw, tail)) => (kw, tail.trim_start()),
                None => (rest, ""),
            };

            return Some(ParsedCommand {
                keyword: keyword.to_lowercase(),
                content,
            });
        }
    }

    None
}

/// 拆分 "名称 [等级]" 形式的参数。
/// 最后一个 Token 若为正整数则视为等级，其余部分为名称；否则整体为名称。
pub fn split_trailing_level(content: &str) -> (&str, Option<u32>) {
    let trimmed = content.trim();
    if let Some((name, last)) = trimmed.rsplit_once(char::is_whitespace) {
        let name = name.trim_end();
        if !name.is_empty()
            && let Ok(level) = last.parse::<u32>()
            && level >= 1
        {
            return (name, Some(level));
        }
    }
    (trimmed, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["/".to_string()]
    }

    #[test]
    fn splits_keyword_and_content() {
        let parsed = parse_command(&prefixes(), "/weapon 示例武器 2").unwrap();
        assert_eq!(parsed.keyword, "weapon");
        assert_eq!(parsed.content, "示例武器 2");
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let parsed = parse_command(&prefixes(), "/MAP 示例地图").unwrap();
        assert_eq!(parsed.keyword, "map");
        assert_eq!(parsed.content, "示例地图");
    }

    #[test]
    fn bare_keyword_has_empty_content() {
        let parsed = parse_command(&prefixes(), "/help").unwrap();
        assert_eq!(parsed.keyword, "help");
        assert_eq!(parsed.content, "");
    }

    #[test]
    fn tolerates_extra_whitespace() {
        let parsed = parse_command(&prefixes(), "  /map   示例地图  ").unwrap();
        assert_eq!(parsed.keyword, "map");
        assert_eq!(parsed.content, "示例地图  ");
    }

    #[test]
    fn non_prefixed_text_is_ignored() {
        assert!(parse_command(&prefixes(), "weapon 示例武器").is_none());
        assert!(parse_command(&prefixes(), "随便聊聊").is_none());
    }

    #[test]
    fn bare_prefix_is_ignored() {
        assert!(parse_command(&prefixes(), "/").is_none());
        assert!(parse_command(&prefixes(), "/   ").is_none());
    }

    #[test]
    fn supports_multiple_prefixes() {
        let prefixes = vec!["/".to_string(), "#".to_string()];
        let parsed = parse_command(&prefixes, "#arc 介绍").unwrap();
        assert_eq!(parsed.keyword, "arc");
        assert_eq!(parsed.content, "介绍");
    }

    #[test]
    fn trailing_level_is_extracted() {
        assert_eq!(split_trailing_level("示例武器 2"), ("示例武器", Some(2)));
        assert_eq!(split_trailing_level("示例武器"), ("示例武器", None));
        // 多词名称仅剥离最后的数字
        assert_eq!(split_trailing_level("AK 47 3"), ("AK 47", Some(3)));
    }

    #[test]
    fn zero_or_text_tail_belongs_to_name() {
        assert_eq!(split_trailing_level("示例武器 0"), ("示例武器 0", None));
        assert_eq!(split_trailing_level("武器 MK2"), ("武器 MK2", None));
        // 纯数字整体视为名称
        assert_eq!(split_trailing_level("2"), ("2", None));
    }
}
