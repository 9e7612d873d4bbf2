use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Email → partner email for one round. Always symmetric.
pub type MatchMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Nonbinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pronouns {
    pub subject: &'static str,
    pub object: &'static str,
    pub possessive: &'static str,
}

impl Gender {
    pub const RECOGNIZED: [&'static str; 3] = ["male", "female", "nonbinary"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Nonbinary => "nonbinary",
        }
    }

    pub fn pronouns(&self) -> Pronouns {
        match self {
            Gender::Male => Pronouns {
                subject: "he",
                object: "him",
                possessive: "his",
            },
            Gender::Female => Pronouns {
                subject: "she",
                object: "her",
                possessive: "her",
            },
            Gender::Nonbinary => Pronouns {
                subject: "they",
                object: "them",
                possessive: "their",
            },
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "nonbinary" | "non-binary" => Ok(Gender::Nonbinary),
            _ => Err(format!(
                "unrecognized gender '{}' (expected one of: {})",
                s,
                Gender::RECOGNIZED.join(", ")
            )),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Long-run fraction of rounds a participant joins, kept as an exact reduced
/// rational in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    numerator: u64,
    denominator: u64,
}

// Deeper decimals would overflow the u64 denominator.
const MAX_DECIMAL_DIGITS: u32 = 18;

impl Frequency {
    pub const ALWAYS: Frequency = Frequency {
        numerator: 1,
        denominator: 1,
    };

    pub fn new(numerator: u64, denominator: u64) -> Result<Self, String> {
        if denominator == 0 {
            return Err("denominator must not be zero".to_string());
        }
        if numerator == 0 {
            return Err("frequency must be greater than 0".to_string());
        }
        if numerator > denominator {
            return Err(format!(
                "frequency {}/{} exceeds 1",
                numerator, denominator
            ));
        }
        let divisor = gcd(numerator, denominator);
        Ok(Self {
            numerator: numerator / divisor,
            denominator: denominator / divisor,
        })
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    pub fn is_always(&self) -> bool {
        self.numerator == self.denominator
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::ALWAYS
    }
}

impl FromStr for Frequency {
    type Err = String;

    /// Accepts `"1/4"`, `"0.25"`, `".5"` or `"1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || format!("'{}' is not a valid frequency", s);

        if let Some((num, den)) = text.split_once('/') {
            let numerator: u64 = num.trim().parse().map_err(|_| invalid())?;
            let denominator: u64 = den.trim().parse().map_err(|_| invalid())?;
            return Frequency::new(numerator, denominator);
        }

        let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
        if (whole.is_empty() && fraction.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let fraction = fraction.trim_end_matches('0');
        let digits = fraction.len() as u32;
        if digits > MAX_DECIMAL_DIGITS {
            return Err(format!("'{}' has too many decimal places", s));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| invalid())?
        };

        let denominator = 10u64.pow(digits);
        let numerator = whole
            .checked_mul(denominator)
            .and_then(|n| n.checked_add(fraction))
            .ok_or_else(|| format!("frequency '{}' exceeds 1", s))?;
        Frequency::new(numerator, denominator)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_always() {
            write!(f, "1")
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub email: String,
    pub friendly_name: String,
    pub full_name: String,
    pub gender: Gender,
    pub cluster: String,
    pub cohort_year: String,
    pub frequency: Frequency,
    pub new_to_cluster: bool,
}

impl Participant {
    /// A participant with defaults for everything but the identity fields.
    pub fn new(email: &str, friendly_name: &str, full_name: &str, gender: Gender) -> Self {
        Self {
            email: email.to_string(),
            friendly_name: friendly_name.to_string(),
            full_name: full_name.to_string(),
            gender,
            cluster: String::new(),
            cohort_year: String::new(),
            frequency: Frequency::ALWAYS,
            new_to_cluster: false,
        }
    }
}

/// Opaque round identifier, typically a date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundLabel(String);

impl RoundLabel {
    pub fn new(label: &str) -> Result<Self, String> {
        let label = label.trim();
        if label.is_empty() {
            return Err("round label cannot be empty".to_string());
        }
        Ok(Self(label.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// "Saturday October 08, 2022" for date-like labels, the raw label otherwise.
    pub fn display_date(&self) -> String {
        ["%Y-%m-%d", "%Y%m%d"]
            .iter()
            .find_map(|fmt| chrono::NaiveDate::parse_from_str(&self.0, fmt).ok())
            .map(|date| date.format("%A %B %d, %Y").to_string())
            .unwrap_or_else(|| self.0.clone())
    }
}

impl fmt::Display for RoundLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One computed round in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub label: RoundLabel,
    pub matches: MatchMap,
}

/// Order-independent key for a pair of emails.
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Collapses a symmetric mapping back into unordered pairs.
pub fn pairs_of(matches: &MatchMap) -> Vec<(String, String)> {
    matches
        .iter()
        .filter(|(email, partner)| email < partner)
        .map(|(email, partner)| (email.clone(), partner.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    pub pairs: Vec<(String, String)>,
    pub unmatched: Option<String>,
}

impl Pairing {
    /// Expands the pairs into the symmetric per-participant mapping, rejecting
    /// self-pairs and participants that appear more than once.
    pub fn to_match_map(&self) -> Result<MatchMap, String> {
        let mut map = MatchMap::new();
        for (a, b) in &self.pairs {
            if a == b {
                return Err(format!("{} cannot be paired with themselves", a));
            }
            for (email, partner) in [(a, b), (b, a)] {
                if map.insert(email.clone(), partner.clone()).is_some() {
                    return Err(format!("{} appears in more than one pair", email));
                }
            }
        }
        if let Some(left) = &self.unmatched {
            if map.contains_key(left) {
                return Err(format!("{} is both matched and unmatched", left));
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_parses_fraction_and_decimal() {
        assert_eq!("1/4".parse::<Frequency>().unwrap(), Frequency::new(1, 4).unwrap());
        assert_eq!("0.25".parse::<Frequency>().unwrap(), Frequency::new(1, 4).unwrap());
        assert_eq!(".5".parse::<Frequency>().unwrap(), Frequency::new(1, 2).unwrap());
        assert_eq!("1".parse::<Frequency>().unwrap(), Frequency::ALWAYS);
        assert_eq!("1.000".parse::<Frequency>().unwrap(), Frequency::ALWAYS);
        assert_eq!(" 2 / 6 ".parse::<Frequency>().unwrap(), Frequency::new(1, 3).unwrap());
    }

    #[test]
    fn test_frequency_rejects_out_of_range() {
        assert!("0".parse::<Frequency>().is_err());
        assert!("0/3".parse::<Frequency>().is_err());
        assert!("1.5".parse::<Frequency>().is_err());
        assert!("5/4".parse::<Frequency>().is_err());
        assert!("-0.5".parse::<Frequency>().is_err());
        assert!("1/0".parse::<Frequency>().is_err());
        assert!("often".parse::<Frequency>().is_err());
        assert!(".".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_gender_lookup_is_case_insensitive() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(" MALE ".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(Gender::Female.pronouns().object, "her");
        assert!("robot".parse::<Gender>().is_err());
    }

    #[test]
    fn test_round_label_formats_dates() {
        let label = RoundLabel::new("2022-10-08").unwrap();
        assert_eq!(label.display_date(), "Saturday October 08, 2022");
        let compact = RoundLabel::new("20221008").unwrap();
        assert_eq!(compact.display_date(), "Saturday October 08, 2022");
        let opaque = RoundLabel::new("autumn-kickoff").unwrap();
        assert_eq!(opaque.display_date(), "autumn-kickoff");
        assert!(RoundLabel::new("  ").is_err());
    }

    #[test]
    fn test_pairing_expands_symmetrically() {
        let pairing = Pairing {
            pairs: vec![("a@x".into(), "b@x".into())],
            unmatched: Some("c@x".into()),
        };
        let map = pairing.to_match_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a@x"], "b@x");
        assert_eq!(map["b@x"], "a@x");
        assert_eq!(pairs_of(&map), vec![("a@x".to_string(), "b@x".to_string())]);
    }

    #[test]
    fn test_pairing_rejects_reused_participant() {
        let pairing = Pairing {
            pairs: vec![("a@x".into(), "b@x".into()), ("a@x".into(), "c@x".into())],
            unmatched: None,
        };
        assert!(pairing.to_match_map().is_err());

        let selfish = Pairing {
            pairs: vec![("a@x".into(), "a@x".into())],
            unmatched: None,
        };
        assert!(selfish.to_match_map().is_err());
    }
}
