//! Storage-unit component classification from the localized item name.

const TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("印花", "印花"),
    ("贴纸", "贴纸"),
    ("涂鸦", "涂鸦"),
    ("探员", "探员"),
    ("音乐盒", "音乐盒"),
    ("徽章", "徽章"),
    ("补丁", "补丁"),
    ("勋章", "徽章"),
    ("硬币", "徽章"),
];

const QUALITY_KEYWORDS: &[(&str, &str)] = &[
    ("StatTrak™", "违禁"),
    ("★", "违禁"),
    ("纪念品", "奇异"),
    ("(Holo)", "非凡"),
    ("(Foil)", "超凡"),
    ("(Gold)", "超凡"),
    ("高级", "高级"),
    ("卓越", "卓越"),
];

/// First keyword found wins; unmatched names are `其他`, missing ones `未知`.
pub fn component_type(item_name: Option<&str>) -> &'static str {
    match item_name.filter(|n| !n.is_empty()) {
        None => "未知",
        Some(name) => TYPE_KEYWORDS
            .iter()
            .find(|(kw, _)| name.contains(kw))
            .map(|(_, ty)| *ty)
            .unwrap_or("其他"),
    }
}

pub fn quality(item_name: Option<&str>) -> &'static str {
    item_name
        .and_then(|name| {
            QUALITY_KEYWORDS
                .iter()
                .find(|(kw, _)| name.contains(kw))
                .map(|(_, q)| *q)
        })
        .unwrap_or("普通级")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type() {
        assert_eq!(component_type(Some("印花 | WOOD7（全息）")), "印花");
        assert_eq!(component_type(Some("2021年 布章 硬币")), "徽章");
        assert_eq!(component_type(Some("AK-47 | 红线")), "其他");
        assert_eq!(component_type(None), "未知");
        assert_eq!(component_type(Some("")), "未知");
    }

    #[test]
    fn test_quality() {
        assert_eq!(quality(Some("★ 蝴蝶刀")), "违禁");
        assert_eq!(quality(Some("印花 | s1mple (Gold)")), "超凡");
        assert_eq!(quality(Some("普通印花")), "普通级");
        assert_eq!(quality(None), "普通级");
    }
}
