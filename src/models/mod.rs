//! Data models for Caseworks

/// `as_str`, `Display` and `FromStr` for enums persisted as text
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

pub mod audit;
pub mod customization;
pub mod equipment;
pub mod notification;
pub mod rental;
pub mod role;
pub mod schedule;

// Re-export commonly used types
pub use customization::{CustomizationRequest, CustomizationStage, StageHistoryEntry};
pub use equipment::{EquipmentItem, EquipmentStatus};
pub use notification::{Notification, ScheduleReminder};
pub use rental::{Rental, RentalStatus};
pub use role::{ActorContext, Operation, Role};
pub use schedule::{Schedule, ScheduleStatus, ScheduleType};

/// Parse a text column into its enum, surfacing corrupt rows as internal errors
pub(crate) fn parse_column<T>(column: &'static str, value: &str) -> crate::error::AppResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| crate::error::AppError::Internal(format!("Corrupt {} column: {}", column, e)))
}
