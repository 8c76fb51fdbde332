//! Protocol version table
//!
//! Every dialect the verifier speaks, ordered by protocol number. Variants are
//! declared in ascending order so the derived `Ord` matches the numeric order.

use std::fmt;

macro_rules! protocol_versions {
    ($($variant:ident = $id:literal => $name:literal,)*) => {
        /// One dialect of the wire protocol.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ProtocolVersion {
            /// Any protocol number not in the table.
            Unknown,
            $($variant,)*
        }

        impl ProtocolVersion {
            /// All known versions, oldest first.
            pub const ALL: &'static [ProtocolVersion] = &[$(ProtocolVersion::$variant,)*];

            /// Numeric protocol id as sent in the handshake.
            pub const fn id(self) -> i32 {
                match self {
                    ProtocolVersion::Unknown => -1,
                    $(ProtocolVersion::$variant => $id,)*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    ProtocolVersion::Unknown => "unknown",
                    $(ProtocolVersion::$variant => $name,)*
                }
            }

            /// Maps a handshake protocol number to a version; unlisted numbers
            /// become [`ProtocolVersion::Unknown`].
            pub const fn from_id(id: i32) -> ProtocolVersion {
                match id {
                    $($id => ProtocolVersion::$variant,)*
                    _ => ProtocolVersion::Unknown,
                }
            }
        }
    };
}

protocol_versions! {
    V1_7_2 = 4 => "1.7.2",
    V1_7_6 = 5 => "1.7.6",
    V1_8 = 47 => "1.8",
    V1_9 = 107 => "1.9",
    V1_9_1 = 108 => "1.9.1",
    V1_9_2 = 109 => "1.9.2",
    V1_9_4 = 110 => "1.9.4",
    V1_10 = 210 => "1.10",
    V1_11 = 315 => "1.11",
    V1_11_1 = 316 => "1.11.1",
    V1_12 = 335 => "1.12",
    V1_12_1 = 338 => "1.12.1",
    V1_12_2 = 340 => "1.12.2",
    V1_13 = 393 => "1.13",
    V1_13_1 = 401 => "1.13.1",
    V1_13_2 = 404 => "1.13.2",
    V1_14 = 477 => "1.14",
    V1_14_1 = 480 => "1.14.1",
    V1_14_2 = 485 => "1.14.2",
    V1_14_3 = 490 => "1.14.3",
    V1_14_4 = 498 => "1.14.4",
    V1_15 = 573 => "1.15",
    V1_15_1 = 575 => "1.15.1",
    V1_15_2 = 578 => "1.15.2",
    V1_16 = 735 => "1.16",
    V1_16_1 = 736 => "1.16.1",
    V1_16_2 = 751 => "1.16.2",
    V1_16_3 = 753 => "1.16.3",
    V1_16_4 = 754 => "1.16.4",
    V1_17 = 755 => "1.17",
    V1_17_1 = 756 => "1.17.1",
    V1_18 = 757 => "1.18",
    V1_18_2 = 758 => "1.18.2",
    V1_19 = 759 => "1.19",
    V1_19_1 = 760 => "1.19.1",
    V1_19_3 = 761 => "1.19.3",
    V1_19_4 = 762 => "1.19.4",
    V1_20 = 763 => "1.20",
    V1_20_2 = 764 => "1.20.2",
    V1_20_3 = 765 => "1.20.3",
    V1_20_5 = 766 => "1.20.5",
    V1_21 = 767 => "1.21",
    V1_21_2 = 768 => "1.21.2",
    V1_21_4 = 769 => "1.21.4",
    V1_21_5 = 770 => "1.21.5",
    V1_21_6 = 771 => "1.21.6",
    V1_21_7 = 772 => "1.21.7",
    V1_21_9 = 773 => "1.21.9",
}

impl ProtocolVersion {
    pub const OLDEST: ProtocolVersion = ProtocolVersion::V1_7_2;
    pub const LATEST: ProtocolVersion = ProtocolVersion::V1_21_9;

    pub fn is_unknown(self) -> bool {
        self == ProtocolVersion::Unknown
    }

    pub fn is_supported(self) -> bool {
        !self.is_unknown()
    }

    /// Inclusive range check.
    pub fn in_between(self, lower: ProtocolVersion, upper: ProtocolVersion) -> bool {
        self >= lower && self <= upper
    }

    /// Versions with a separate configuration phase after login.
    pub fn has_configuration_phase(self) -> bool {
        self >= ProtocolVersion::V1_20_2
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id_known_and_unknown() {
        assert_eq!(ProtocolVersion::from_id(758), ProtocolVersion::V1_18_2);
        assert_eq!(ProtocolVersion::from_id(47), ProtocolVersion::V1_8);
        assert_eq!(ProtocolVersion::from_id(1), ProtocolVersion::Unknown);
        assert_eq!(ProtocolVersion::from_id(-1), ProtocolVersion::Unknown);
    }

    #[test]
    fn test_table_is_sorted_by_id() {
        for pair in ProtocolVersion::ALL.windows(2) {
            assert!(pair[0].id() < pair[1].id(), "{} !< {}", pair[0], pair[1]);
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(ProtocolVersion::ALL.first(), Some(&ProtocolVersion::OLDEST));
        assert_eq!(ProtocolVersion::ALL.last(), Some(&ProtocolVersion::LATEST));
    }

    #[test]
    fn test_ids_round_trip() {
        for version in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_id(version.id()), *version);
        }
    }

    #[test]
    fn test_unknown_sorts_first() {
        assert!(ProtocolVersion::Unknown < ProtocolVersion::OLDEST);
        assert!(ProtocolVersion::Unknown.is_unknown());
    }

    #[test]
    fn test_in_between_is_inclusive() {
        let v = ProtocolVersion::V1_12_2;
        assert!(v.in_between(ProtocolVersion::V1_12_2, ProtocolVersion::V1_13));
        assert!(v.in_between(ProtocolVersion::V1_8, ProtocolVersion::V1_12_2));
        assert!(!v.in_between(ProtocolVersion::V1_13, ProtocolVersion::V1_20));
    }
}
