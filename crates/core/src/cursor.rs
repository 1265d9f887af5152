use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EventIdx, LedgerSeq, TxIdx, FIRST_LEDGER};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("expected 3 cursor fields, found {0}")]
    WrongFieldCount(usize),

    #[error("invalid cursor field `{0}`")]
    InvalidField(String),

    #[error("cursor ledger {0} precedes the first ledger")]
    LedgerOutOfRange(LedgerSeq),
}

/// Totally ordered position within the ledger stream.
///
/// Field order matters: the derived `Ord` is the lexicographic comparison on
/// (ledger, tx, event) that every scan relies on.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Cursor {
    pub ledger: LedgerSeq,
    pub tx: TxIdx,
    pub event: EventIdx,
}

pub const DELIMITER: char = '-';

impl Cursor {
    pub const MIN: Cursor = Cursor {
        ledger: 0,
        tx: 0,
        event: 0,
    };

    pub const MAX: Cursor = Cursor {
        ledger: u32::MAX,
        tx: u32::MAX,
        event: u32::MAX,
    };

    /// Checked constructor for positions that reference actual ledger data.
    /// The sentinels bypass this on purpose.
    pub fn new(ledger: LedgerSeq, tx: TxIdx, event: EventIdx) -> Result<Self, CursorError> {
        if ledger < FIRST_LEDGER {
            return Err(CursorError::LedgerOutOfRange(ledger));
        }

        Ok(Self { ledger, tx, event })
    }

    /// The position immediately after this one. Overflow on the event field
    /// saturates to `MAX` so that `next` of the last representable position
    /// still closes any range.
    pub fn next(&self) -> Cursor {
        match self.event.checked_add(1) {
            Some(event) => Cursor { event, ..*self },
            None => Cursor::MAX,
        }
    }

    /// Packs the three fields into a single integer preserving order, for
    /// use as a range-scannable store key.
    pub fn pack(&self) -> u128 {
        ((self.ledger as u128) << 64) | ((self.tx as u128) << 32) | self.event as u128
    }

    pub fn unpack(raw: u128) -> Cursor {
        Cursor {
            ledger: (raw >> 64) as u32,
            tx: (raw >> 32) as u32,
            event: raw as u32,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:010}{}{:010}{}{:010}",
            self.ledger, DELIMITER, self.tx, DELIMITER, self.event
        )
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(DELIMITER).collect();

        if fields.len() != 3 {
            return Err(CursorError::WrongFieldCount(fields.len()));
        }

        let parse = |field: &str| -> Result<u32, CursorError> {
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CursorError::InvalidField(field.to_string()));
            }

            field
                .parse()
                .map_err(|_| CursorError::InvalidField(field.to_string()))
        };

        Ok(Cursor {
            ledger: parse(fields[0])?,
            tx: parse(fields[1])?,
            event: parse(fields[2])?,
        })
    }
}

/// Half-open interval [start, end) of cursor positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRange {
    pub start: Cursor,
    pub end: Cursor,
}

impl CursorRange {
    pub fn contains(&self, cursor: Cursor) -> bool {
        self.start <= cursor && cursor < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        let a = Cursor {
            ledger: 10,
            tx: 1,
            event: 5,
        };
        let b = Cursor {
            ledger: 10,
            tx: 2,
            event: 0,
        };
        let c = Cursor {
            ledger: 11,
            tx: 0,
            event: 0,
        };

        assert!(a < b);
        assert!(b < c);
        assert!(Cursor::MIN < a);
        assert!(c < Cursor::MAX);
    }

    #[test]
    fn string_form_round_trips() {
        let cursor = Cursor {
            ledger: 103,
            tx: 1,
            event: 0,
        };

        let rendered = cursor.to_string();
        assert_eq!(rendered, "0000000103-0000000001-0000000000");
        assert_eq!(rendered.parse::<Cursor>().unwrap(), cursor);

        assert_eq!(
            Cursor::MAX.to_string().parse::<Cursor>().unwrap(),
            Cursor::MAX
        );
        assert_eq!(
            Cursor::MIN.to_string().parse::<Cursor>().unwrap(),
            Cursor::MIN
        );
    }

    #[test]
    fn parsing_rejects_malformed_input() {
        assert_eq!(
            "103-1".parse::<Cursor>(),
            Err(CursorError::WrongFieldCount(2))
        );
        assert_eq!(
            "103-1-0-0".parse::<Cursor>(),
            Err(CursorError::WrongFieldCount(4))
        );
        assert_eq!(
            "103-x-0".parse::<Cursor>(),
            Err(CursorError::InvalidField("x".to_string()))
        );
        assert_eq!(
            "103--0".parse::<Cursor>(),
            Err(CursorError::InvalidField(String::new()))
        );
        assert_eq!(
            "103-+1-0".parse::<Cursor>(),
            Err(CursorError::InvalidField("+1".to_string()))
        );
        // one past u32::MAX
        assert_eq!(
            "4294967296-0-0".parse::<Cursor>(),
            Err(CursorError::InvalidField("4294967296".to_string()))
        );
    }

    #[test]
    fn next_saturates_on_event_overflow() {
        let cursor = Cursor {
            ledger: 10,
            tx: 1,
            event: 2,
        };
        assert_eq!(
            cursor.next(),
            Cursor {
                ledger: 10,
                tx: 1,
                event: 3
            }
        );

        let edge = Cursor {
            ledger: 10,
            tx: 1,
            event: u32::MAX,
        };
        assert_eq!(edge.next(), Cursor::MAX);
    }

    #[test]
    fn checked_construction_validates_first_ledger() {
        assert!(Cursor::new(2, 0, 0).is_ok());
        assert_eq!(Cursor::new(1, 0, 0), Err(CursorError::LedgerOutOfRange(1)));
    }

    #[test]
    fn packing_preserves_order() {
        let a = Cursor {
            ledger: 10,
            tx: 1,
            event: u32::MAX,
        };
        let b = Cursor {
            ledger: 10,
            tx: 2,
            event: 0,
        };

        assert!(a.pack() < b.pack());
        assert_eq!(Cursor::unpack(a.pack()), a);
        assert_eq!(Cursor::unpack(b.pack()), b);
    }

    #[test]
    fn range_is_half_open() {
        let range = CursorRange {
            start: Cursor {
                ledger: 10,
                tx: 0,
                event: 0,
            },
            end: Cursor {
                ledger: 11,
                tx: 0,
                event: 0,
            },
        };

        assert!(range.contains(range.start));
        assert!(range.contains(Cursor {
            ledger: 10,
            tx: 9,
            event: 9
        }));
        assert!(!range.contains(range.end));
    }
}
