//! Field text cleanup and canonicalization.
//!
//! Raw engine output for the name and ethnicity regions is noisy: label
//! characters bleed into the crop, punctuation and digits are misread, and
//! ethnicity names frequently come back truncated. The functions here are
//! pure string transforms; recognition strategy lives upstream.

use std::sync::LazyLock;

/// Known ethnicity root tokens and the canonical name each maps to.
///
/// Covers the 56 canonical names; `蒙`/`蒙古` and `维`/`维吾尔` are listed
/// twice so heavily truncated readings still resolve.
const ETHNICITY_ROOTS: [(&str, &str); 58] = [
    ("汉", "汉族"),
    ("蒙", "蒙古族"),
    ("蒙古", "蒙古族"),
    ("回", "回族"),
    ("藏", "藏族"),
    ("维", "维吾尔族"),
    ("维吾尔", "维吾尔族"),
    ("苗", "苗族"),
    ("彝", "彝族"),
    ("壮", "壮族"),
    ("布依", "布依族"),
    ("朝鲜", "朝鲜族"),
    ("满", "满族"),
    ("侗", "侗族"),
    ("瑶", "瑶族"),
    ("白", "白族"),
    ("土家", "土家族"),
    ("哈尼", "哈尼族"),
    ("哈萨克", "哈萨克族"),
    ("傣", "傣族"),
    ("黎", "黎族"),
    ("傈僳", "傈僳族"),
    ("佤", "佤族"),
    ("畲", "畲族"),
    ("高山", "高山族"),
    ("拉祜", "拉祜族"),
    ("水", "水族"),
    ("东乡", "东乡族"),
    ("纳西", "纳西族"),
    ("景颇", "景颇族"),
    ("柯尔克孜", "柯尔克孜族"),
    ("土", "土族"),
    ("达斡尔", "达斡尔族"),
    ("仫佬", "仫佬族"),
    ("羌", "羌族"),
    ("布朗", "布朗族"),
    ("撒拉", "撒拉族"),
    ("毛南", "毛南族"),
    ("仡佬", "仡佬族"),
    ("锡伯", "锡伯族"),
    ("阿昌", "阿昌族"),
    ("普米", "普米族"),
    ("塔吉克", "塔吉克族"),
    ("怒", "怒族"),
    ("乌孜别克", "乌孜别克族"),
    ("俄罗斯", "俄罗斯族"),
    ("鄂温克", "鄂温克族"),
    ("德昂", "德昂族"),
    ("保安", "保安族"),
    ("裕固", "裕固族"),
    ("京", "京族"),
    ("塔塔尔", "塔塔尔族"),
    ("独龙", "独龙族"),
    ("鄂伦春", "鄂伦春族"),
    ("赫哲", "赫哲族"),
    ("门巴", "门巴族"),
    ("珞巴", "珞巴族"),
    ("基诺", "基诺族"),
];

/// Root table ordered by descending root length, so a multi-character root
/// always matches before any single-character root it contains
/// (`蒙古` before `蒙`, `土家` before `土`).
static ROOTS_BY_LENGTH: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut roots = ETHNICITY_ROOTS.to_vec();
    roots.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    roots
});

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{f900}'..='\u{faff}')
}

fn is_unified_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}')
}

/// Longest maximal run of CJK ideographs in `text`; first run wins ties.
fn longest_cjk_run(text: &str) -> &str {
    text.split(|c: char| !is_unified_cjk(c)).fold("", |best, run| {
        if run.chars().count() > best.chars().count() {
            run
        } else {
            best
        }
    })
}

/// Clean a raw name reading into a bare personal name.
///
/// Keeps CJK ideographs and Basic Latin letters (minority names may be
/// transliterated), strips the `姓名` label conservatively, and recovers
/// from over-stripping by falling back to the longest CJK run of the
/// trimmed input. The result is capped at 8 characters and may be empty;
/// an empty name is a valid no-detection outcome, not an error.
pub fn canonicalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut text: String = trimmed
        .chars()
        .filter(|&c| is_cjk(c) || c.is_ascii_alphabetic())
        .collect();

    text = text.replace("姓名", "");
    // A leading stray label character is dropped only when something
    // remains afterwards; a lone label character is left alone.
    if text.starts_with('名') && text.chars().count() > 1 {
        text.remove(0);
    }
    if text.starts_with('姓') && text.chars().count() > 1 {
        text.remove(0);
    }

    if text.is_empty() {
        text = longest_cjk_run(trimmed).to_string();
    }

    text.chars().take(8).collect()
}

/// Clean a raw ethnicity reading and map it onto a canonical name.
///
/// After label stripping, the text is matched against the root table by
/// containment, longest roots first. Unmatched readings that already end
/// in `族` pass through as-is; short unmatched readings are treated as a
/// truncated root and get the suffix appended. May return an empty string.
pub fn canonicalize_ethnicity(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut text: String = trimmed.chars().filter(|&c| is_cjk(c)).collect();

    text = text.replace("民族", "");
    // Never strip the leading 民 off a reading that already ends in 族:
    // that would corrupt a valid name down to the bare suffix.
    if text.starts_with('民') && text.chars().count() > 1 && !text.ends_with('族') {
        text.remove(0);
    }

    if text.is_empty() {
        text = longest_cjk_run(trimmed).to_string();
    }

    for (root, canonical) in ROOTS_BY_LENGTH.iter() {
        if text.contains(root) {
            return (*canonical).to_string();
        }
    }

    if text.ends_with('族') {
        text
    } else if !text.is_empty() && text.chars().count() <= 4 {
        text + "族"
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_passthrough() {
        assert_eq!(canonicalize_name("张三"), "张三");
    }

    #[test]
    fn test_name_strips_label_token() {
        assert_eq!(canonicalize_name("姓名张三"), "张三");
        assert_eq!(canonicalize_name("姓名：李四"), "李四");
    }

    #[test]
    fn test_name_strips_noise_characters() {
        assert_eq!(canonicalize_name("张三456"), "张三");
        assert_eq!(canonicalize_name("  王五  "), "王五");
    }

    #[test]
    fn test_name_keeps_latin_letters() {
        assert_eq!(canonicalize_name("姓名王小明abc"), "王小明abc");
        assert_eq!(canonicalize_name("Aisha"), "Aisha");
    }

    #[test]
    fn test_name_single_leading_label_char() {
        assert_eq!(canonicalize_name("姓李"), "李");
        assert_eq!(canonicalize_name("名王五"), "王五");
        // A lone label character is never stripped down to nothing.
        assert_eq!(canonicalize_name("姓"), "姓");
    }

    #[test]
    fn test_name_fallback_recovers_label_only_text() {
        // Stripping wipes the text, so the longest CJK run of the trimmed
        // input is recovered instead.
        assert_eq!(canonicalize_name("姓名"), "姓名");
    }

    #[test]
    fn test_name_truncates_garbage_runs() {
        let long = "王".repeat(12);
        assert_eq!(canonicalize_name(&long).chars().count(), 8);
    }

    #[test]
    fn test_name_empty_input() {
        assert_eq!(canonicalize_name(""), "");
        assert_eq!(canonicalize_name("@@@123"), "");
    }

    #[test]
    fn test_name_is_idempotent() {
        for raw in ["姓名张三", "张三456", "王小明abc", "姓李", ""] {
            let once = canonicalize_name(raw);
            assert_eq!(canonicalize_name(&once), once);
        }
    }

    #[test]
    fn test_ethnicity_canonical_passthrough() {
        assert_eq!(canonicalize_ethnicity("汉族"), "汉族");
        assert_eq!(canonicalize_ethnicity("蒙古族123"), "蒙古族");
    }

    #[test]
    fn test_ethnicity_strips_label_token() {
        assert_eq!(canonicalize_ethnicity("民族汉族"), "汉族");
        assert_eq!(canonicalize_ethnicity("民族：汉"), "汉族");
    }

    #[test]
    fn test_ethnicity_expands_truncated_root() {
        assert_eq!(canonicalize_ethnicity("汉"), "汉族");
        assert_eq!(canonicalize_ethnicity("蒙"), "蒙古族");
    }

    #[test]
    fn test_ethnicity_prefix_priority() {
        // The two-character root must win over the single-character root it
        // contains; the reading must never collapse into 蒙族.
        assert_eq!(canonicalize_ethnicity("蒙古"), "蒙古族");
        assert_eq!(canonicalize_ethnicity("土家"), "土家族");
        assert_eq!(canonicalize_ethnicity("维吾尔"), "维吾尔族");
    }

    #[test]
    fn test_ethnicity_leading_label_char_guard() {
        // Leading 民 is stripped off a truncated reading...
        assert_eq!(canonicalize_ethnicity("民回"), "回族");
        // ...but not when the text already ends with the suffix.
        assert_eq!(canonicalize_ethnicity("民蒙古族"), "蒙古族");
    }

    #[test]
    fn test_ethnicity_unknown_readings() {
        // Ends with the suffix: trusted as an uncommon but valid name.
        assert_eq!(canonicalize_ethnicity("某某族"), "某某族");
        // Short unmatched text: assumed to be a truncated root.
        assert_eq!(canonicalize_ethnicity("某某"), "某某族");
        // Long unmatched text passes through rather than losing data.
        assert_eq!(canonicalize_ethnicity("某某某某某"), "某某某某某");
    }

    #[test]
    fn test_ethnicity_empty_input() {
        assert_eq!(canonicalize_ethnicity(""), "");
        assert_eq!(canonicalize_ethnicity("abc123"), "");
    }

    #[test]
    fn test_ethnicity_mapping_totality() {
        // Every canonical name must be a fixed point of canonicalization.
        for (_, canonical) in ETHNICITY_ROOTS.iter() {
            assert_eq!(canonicalize_ethnicity(canonical), *canonical);
        }
    }

    #[test]
    fn test_ethnicity_is_idempotent() {
        for raw in ["民族汉族", "蒙古", "民回", "某某", ""] {
            let once = canonicalize_ethnicity(raw);
            assert_eq!(canonicalize_ethnicity(&once), once);
        }
    }

    #[test]
    fn test_roots_sorted_by_descending_length() {
        let lengths: Vec<usize> = ROOTS_BY_LENGTH
            .iter()
            .map(|(root, _)| root.chars().count())
            .collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(lengths.len(), ETHNICITY_ROOTS.len());
    }

    #[test]
    fn test_longest_cjk_run_prefers_first_on_ties() {
        assert_eq!(longest_cjk_run("张三 李四"), "张三");
        assert_eq!(longest_cjk_run("a张三丰b李四c"), "张三丰");
        assert_eq!(longest_cjk_run("abc"), "");
    }
}
