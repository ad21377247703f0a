//! Validated domain records for the job board.
//!
//! # Responsibility
//! - Define the records each repository reads and writes.
//! - Own field-level validation so repositories can reject bad writes early.
//!
//! # Invariants
//! - Every record is identified by a UUID v4.
//! - Enumerations persist as lowercase snake_case text and round-trip exactly.

/// Declares a closed set of values persisted as snake_case text.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Text stored in SQL.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parses stored text; unknown values yield `None`.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod account;
pub mod application;
pub mod company;
pub mod engagement;
pub mod job;
pub mod profile;
pub mod review;
pub mod team;
pub mod user;
pub mod validation;
