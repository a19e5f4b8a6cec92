use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::flows::ApprovalError;

/// Job-title role carried by a signed-in user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Lecturer,
    #[serde(rename = "HOD")]
    Hod,
    Dean,
    #[serde(rename = "VC")]
    Vc,
    Staff,
    Admin,
}

impl Role {
    pub const ALL: [Role; 7] =
        [Self::Student, Self::Lecturer, Self::Hod, Self::Dean, Self::Vc, Self::Staff, Self::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Lecturer => "Lecturer",
            Self::Hod => "HOD",
            Self::Dean => "Dean",
            Self::Vc => "VC",
            Self::Staff => "Staff",
            Self::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApprovalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "lecturer" => Ok(Self::Lecturer),
            "hod" => Ok(Self::Hod),
            "dean" => Ok(Self::Dean),
            "vc" => Ok(Self::Vc),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            _ => Err(ApprovalError::UnknownRole { role: value.to_string() }),
        }
    }
}

/// The person taking an action, supplied by the caller's session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), name: name.into(), role }
    }
}

#[cfg(test)]
mod tests {
    use super::Role;
    use crate::flows::ApprovalError;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("hod".parse::<Role>(), Ok(Role::Hod));
        assert_eq!(" VC ".parse::<Role>(), Ok(Role::Vc));
        assert_eq!("Lecturer".parse::<Role>(), Ok(Role::Lecturer));
    }

    #[test]
    fn unknown_role_is_reported() {
        assert_eq!(
            "registrar".parse::<Role>(),
            Err(ApprovalError::UnknownRole { role: "registrar".to_string() })
        );
    }

    #[test]
    fn role_serializes_with_display_label() {
        let encoded = serde_json::to_string(&Role::Hod).expect("serialize role");
        assert_eq!(encoded, "\"HOD\"");

        let decoded: Role = serde_json::from_str("\"VC\"").expect("deserialize role");
        assert_eq!(decoded, Role::Vc);
    }

    #[test]
    fn display_matches_as_str_for_every_role() {
        for role in Role::ALL {
            assert_eq!(role.to_string(), role.as_str());
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }
}
