//! Numeral classes shared by the built-in title rules and inference.

/// Chinese numerals, including financial forms.
pub const ZH_NUMERAL_CHARS: &str = "零〇一二三四五六七八九十百千万两壹贰叁肆伍陆柒捌玖拾佰仟";

/// Regex class source for any numeral a heading may carry.
pub const ANY_NUMBER: &str = r"[0-9０-９]+|[零〇一二三四五六七八九十百千万两壹贰叁肆伍陆柒捌玖拾佰仟]+";

/// English ordinals spelled out, case-insensitive.
pub const EN_NUMBER_WORDS: &str = r"(?i:one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumeralKind {
    Arabic,
    Chinese,
    Roman,
}

impl NumeralKind {
    pub fn of(c: char) -> Option<Self> {
        if c.is_ascii_digit() || ('０'..='９').contains(&c) {
            Some(NumeralKind::Arabic)
        } else if ZH_NUMERAL_CHARS.contains(c) {
            Some(NumeralKind::Chinese)
        } else if matches!(c, 'I' | 'V' | 'X' | 'L' | 'C' | 'D' | 'M') {
            Some(NumeralKind::Roman)
        } else {
            None
        }
    }

    pub fn accepts(self, c: char) -> bool {
        NumeralKind::of(c) == Some(self)
    }

    /// Regex class matching one or more numerals of this kind.
    pub fn regex_class(self) -> &'static str {
        match self {
            NumeralKind::Arabic => "[0-9０-９]+",
            NumeralKind::Chinese => "[零〇一二三四五六七八九十百千万两壹贰叁肆伍陆柒捌玖拾佰仟]+",
            NumeralKind::Roman => "[IVXLCDM]+",
        }
    }

    pub fn value(self, digits: &str) -> Option<u64> {
        match self {
            NumeralKind::Arabic => parse_arabic(digits),
            NumeralKind::Chinese => parse_chinese(digits),
            NumeralKind::Roman => parse_roman(digits),
        }
    }
}

fn parse_arabic(s: &str) -> Option<u64> {
    let mut value: u64 = 0;
    for c in s.chars() {
        let d = match c {
            '0'..='9' => c as u64 - '0' as u64,
            '０'..='９' => c as u64 - '０' as u64,
            _ => return None,
        };
        value = value.checked_mul(10)?.checked_add(d)?;
    }
    (!s.is_empty()).then_some(value)
}

fn zh_digit(c: char) -> Option<u64> {
    Some(match c {
        '零' | '〇' => 0,
        '一' | '壹' => 1,
        '二' | '两' | '贰' => 2,
        '三' | '叁' => 3,
        '四' | '肆' => 4,
        '五' | '伍' => 5,
        '六' | '陆' => 6,
        '七' | '柒' => 7,
        '八' | '捌' => 8,
        '九' | '玖' => 9,
        _ => return None,
    })
}

fn zh_unit(c: char) -> Option<u64> {
    Some(match c {
        '十' | '拾' => 10,
        '百' | '佰' => 100,
        '千' | '仟' => 1_000,
        '万' => 10_000,
        _ => return None,
    })
}

/// Parse positional (`一二三` = 123) and unit (`一百二十三`) forms.
pub fn parse_chinese(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| zh_digit(c).is_some()) && s.chars().count() > 1 {
        return s
            .chars()
            .try_fold(0u64, |acc, c| acc.checked_mul(10)?.checked_add(zh_digit(c)?));
    }

    let mut total: u64 = 0;
    let mut section: u64 = 0;
    let mut digit: Option<u64> = None;
    for c in s.chars() {
        if let Some(d) = zh_digit(c) {
            digit = Some(d);
        } else if let Some(unit) = zh_unit(c) {
            if unit == 10_000 {
                section += digit.take().unwrap_or(0);
                total += section.max(1) * unit;
                section = 0;
            } else {
                // A bare 十 means 10.
                section += digit.take().unwrap_or(1) * unit;
            }
        } else {
            return None;
        }
    }
    Some(total + section + digit.unwrap_or(0))
}

pub fn parse_roman(s: &str) -> Option<u64> {
    fn val(c: char) -> Option<u64> {
        Some(match c {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        })
    }
    let values: Vec<u64> = s.chars().map(val).collect::<Option<_>>()?;
    if values.is_empty() {
        return None;
    }
    // A numeral smaller than its successor is subtractive (IV = 4).
    let signed: i64 = values
        .iter()
        .enumerate()
        .map(|(i, v)| match values.get(i + 1) {
            Some(next) if next > v => -(*v as i64),
            _ => *v as i64,
        })
        .sum();
    u64::try_from(signed).ok()
}
