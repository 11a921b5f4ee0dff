//! 英語の国名から QWeather が返す中国語の国名への対応表。

const COUNTRIES: &[(&str, &str)] = &[
    ("argentina", "阿根廷"),
    ("australia", "澳大利亚"),
    ("austria", "奥地利"),
    ("belgium", "比利时"),
    ("brazil", "巴西"),
    ("cambodia", "柬埔寨"),
    ("canada", "加拿大"),
    ("chile", "智利"),
    ("china", "中国"),
    ("czech republic", "捷克"),
    ("denmark", "丹麦"),
    ("egypt", "埃及"),
    ("finland", "芬兰"),
    ("france", "法国"),
    ("germany", "德国"),
    ("greece", "希腊"),
    ("hong kong", "中国香港"),
    ("hungary", "匈牙利"),
    ("iceland", "冰岛"),
    ("india", "印度"),
    ("indonesia", "印度尼西亚"),
    ("ireland", "爱尔兰"),
    ("israel", "以色列"),
    ("italy", "意大利"),
    ("japan", "日本"),
    ("kazakhstan", "哈萨克斯坦"),
    ("laos", "老挝"),
    ("macau", "中国澳门"),
    ("malaysia", "马来西亚"),
    ("mexico", "墨西哥"),
    ("mongolia", "蒙古"),
    ("myanmar", "缅甸"),
    ("nepal", "尼泊尔"),
    ("netherlands", "荷兰"),
    ("new zealand", "新西兰"),
    ("north korea", "朝鲜"),
    ("norway", "挪威"),
    ("pakistan", "巴基斯坦"),
    ("philippines", "菲律宾"),
    ("poland", "波兰"),
    ("portugal", "葡萄牙"),
    ("russia", "俄罗斯"),
    ("saudi arabia", "沙特阿拉伯"),
    ("singapore", "新加坡"),
    ("south africa", "南非"),
    ("south korea", "韩国"),
    ("korea", "韩国"),
    ("spain", "西班牙"),
    ("sweden", "瑞典"),
    ("switzerland", "瑞士"),
    ("taiwan", "中国台湾"),
    ("thailand", "泰国"),
    ("turkey", "土耳其"),
    ("ukraine", "乌克兰"),
    ("united arab emirates", "阿联酋"),
    ("united kingdom", "英国"),
    ("uk", "英国"),
    ("united states", "美国"),
    ("usa", "美国"),
    ("vietnam", "越南"),
];

/// 国名（大文字小文字は無視）を中国語表記に変換する。
pub fn localized_country_name(country: &str) -> Option<&'static str> {
    let key = country.trim().to_lowercase();
    COUNTRIES
        .iter()
        .find(|(en, _)| *en == key)
        .map(|(_, zh)| *zh)
}
