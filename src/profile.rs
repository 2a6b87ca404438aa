use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_AGE: u8 = 5;
pub const MAX_AGE: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    Reading,
}

impl LearningStyle {
    /// Tally order used by the quiz; ties go to the earlier style.
    pub const ALL: [LearningStyle; 4] = [
        LearningStyle::Visual,
        LearningStyle::Auditory,
        LearningStyle::Kinesthetic,
        LearningStyle::Reading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Auditory => "auditory",
            LearningStyle::Kinesthetic => "kinesthetic",
            LearningStyle::Reading => "reading",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "Visual Learner",
            LearningStyle::Auditory => "Auditory Learner",
            LearningStyle::Kinesthetic => "Kinesthetic Learner",
            LearningStyle::Reading => "Reading/Writing Learner",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "Visual learners learn best by seeing. They prefer pictures, diagrams, and spatial understanding.",
            LearningStyle::Auditory => "Auditory learners learn best by hearing. They prefer discussions, verbal instructions, and sound.",
            LearningStyle::Kinesthetic => "Kinesthetic learners learn best by doing. They prefer hands-on activities and physical movement.",
            LearningStyle::Reading => "Reading/Writing learners learn best through text. They prefer reading books and taking notes.",
        }
    }

    /// Teaching suggestions shown with the quiz result.
    pub fn tips(&self) -> [&'static str; 4] {
        match self {
            LearningStyle::Visual => [
                "Use diagrams, charts, and pictures when teaching",
                "Highlight important information with colors",
                "Use videos and visual demonstrations",
                "Create mind maps for organizing information",
            ],
            LearningStyle::Auditory => [
                "Encourage discussions and verbal explanations",
                "Use audio recordings and verbal instructions",
                "Read aloud and use rhymes or songs",
                "Allow them to talk through problems",
            ],
            LearningStyle::Kinesthetic => [
                "Incorporate hands-on activities and experiments",
                "Take frequent breaks for physical movement",
                "Use manipulatives and physical objects",
                "Allow them to act out concepts",
            ],
            LearningStyle::Reading => [
                "Provide written instructions and reading materials",
                "Encourage note-taking and journaling",
                "Use lists and written outlines",
                "Have them rewrite information in their own words",
            ],
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningStyle {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visual" => Ok(LearningStyle::Visual),
            "auditory" => Ok(LearningStyle::Auditory),
            "kinesthetic" => Ok(LearningStyle::Kinesthetic),
            "reading" => Ok(LearningStyle::Reading),
            "" => Err(ProfileError::MissingLearningStyle),
            other => Err(ProfileError::UnknownLearningStyle(other.to_string())),
        }
    }
}

/// The learner the tutor is talking to. Sent with every chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub name: String,
    #[serde(deserialize_with = "deserialize_age")]
    pub age: u8,
    pub learning_style: LearningStyle,
}

impl LearnerProfile {
    pub fn is_visual(&self) -> bool {
        self.learning_style == LearningStyle::Visual
    }
}

// Registration forms historically stored the age as a string. Either form
// must fall within MIN_AGE..=MAX_AGE.
fn deserialize_age<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Age {
        Number(i64),
        Text(String),
    }

    let age = match Age::deserialize(deserializer)? {
        Age::Number(n) => n,
        Age::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom)?,
    };
    u8::try_from(age)
        .ok()
        .filter(|a| (MIN_AGE..=MAX_AGE).contains(a))
        .ok_or_else(|| serde::de::Error::custom(ProfileError::AgeOutOfRange))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Name must be at least 2 characters.")]
    NameTooShort,
    #[error("Age must be between 5 and 18")]
    AgeOutOfRange,
    #[error("Please select a learning style.")]
    MissingLearningStyle,
    #[error("Unknown learning style: {0}")]
    UnknownLearningStyle(String),
}

/// Raw registration input, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub age: String,
    pub learning_style: String,
}

impl RegistrationForm {
    /// Validate every field and report all problems at once.
    pub fn validate(&self) -> Result<LearnerProfile, Vec<ProfileError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.chars().count() < 2 {
            errors.push(ProfileError::NameTooShort);
        }

        let age = match self.age.trim().parse::<u8>() {
            Ok(age) if (MIN_AGE..=MAX_AGE).contains(&age) => Some(age),
            _ => {
                errors.push(ProfileError::AgeOutOfRange);
                None
            }
        };

        let style = match self.learning_style.parse::<LearningStyle>() {
            Ok(style) => Some(style),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        match (age, style) {
            (Some(age), Some(learning_style)) if errors.is_empty() => Ok(LearnerProfile {
                name: name.to_string(),
                age,
                learning_style,
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, age: &str, style: &str) -> RegistrationForm {
        RegistrationForm {
            name: name.into(),
            age: age.into(),
            learning_style: style.into(),
        }
    }

    #[test]
    fn test_valid_registration() {
        let profile = form("Ada", "12", "visual").validate().unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.age, 12);
        assert!(profile.is_visual());
    }

    #[test]
    fn test_registration_reports_every_field() {
        let errors = form("A", "19", "").validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ProfileError::NameTooShort,
                ProfileError::AgeOutOfRange,
                ProfileError::MissingLearningStyle
            ]
        );
    }

    #[test]
    fn test_age_bounds_inclusive() {
        assert!(form("Bo", "5", "reading").validate().is_ok());
        assert!(form("Bo", "18", "reading").validate().is_ok());
        assert!(form("Bo", "4", "reading").validate().is_err());
        assert!(form("Bo", "ten", "reading").validate().is_err());
    }

    #[test]
    fn test_profile_json_accepts_string_age() {
        let profile: LearnerProfile =
            serde_json::from_str(r#"{"name":"Ada","age":"9","learningStyle":"auditory"}"#).unwrap();
        assert_eq!(profile.age, 9);
        assert_eq!(profile.learning_style, LearningStyle::Auditory);

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["learningStyle"], "auditory");
        assert_eq!(json["age"], 9);
    }

    #[test]
    fn test_profile_json_enforces_age_range() {
        let parse = |age: &str| {
            serde_json::from_str::<LearnerProfile>(&format!(
                r#"{{"name":"Ada","age":{},"learningStyle":"visual"}}"#,
                age
            ))
        };
        assert_eq!(parse("5").unwrap().age, 5);
        assert_eq!(parse("\"18\"").unwrap().age, 18);
        for bad in ["4", "19", "200", "300", "-1", "\"200\"", "\"300\"", "\"nine\""] {
            assert!(parse(bad).is_err(), "age {bad} should be rejected");
        }
        let err = parse("200").unwrap_err().to_string();
        assert!(err.contains("Age must be between 5 and 18"), "{err}");
    }

    #[test]
    fn test_unknown_style_rejected() {
        assert_eq!(
            "musical".parse::<LearningStyle>(),
            Err(ProfileError::UnknownLearningStyle("musical".into()))
        );
    }
}
