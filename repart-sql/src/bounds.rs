//! The half-open partition range and its canonical literal form.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ident::quote_ident;

/// Canonical timestamp literal format used everywhere a bound appears.
const BOUND_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A half-open partition range `[lower, upper)` over a timestamp column.
///
/// Every SQL fragment that mentions the range - the `CHECK` expression, the
/// `ATTACH PARTITION ... FOR VALUES` clause and the verification probe - is
/// rendered from the same two literals, so the check-constraint bounds and
/// the attach bounds are byte-identical by construction. PostgreSQL only
/// skips the validating scan during attach when the validated constraint
/// proves the bounds, so the literals must never be rendered twice through
/// different code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionBounds {
    pub lower: NaiveDateTime,
    pub upper: NaiveDateTime,
}

impl PartitionBounds {
    pub fn new(lower: NaiveDateTime, upper: NaiveDateTime) -> Self {
        Self { lower, upper }
    }

    pub fn lower_literal(&self) -> String {
        self.lower.format(BOUND_FORMAT).to_string()
    }

    pub fn upper_literal(&self) -> String {
        self.upper.format(BOUND_FORMAT).to_string()
    }

    /// The range predicate, as used in the check constraint and the probe
    /// query: `("col" >= 'lower' AND "col" < 'upper')`.
    pub fn check_expr(&self, column: &str) -> String {
        let col = quote_ident(column);
        format!(
            "({col} >= '{}' AND {col} < '{}')",
            self.lower_literal(),
            self.upper_literal()
        )
    }

    /// The attach clause: `FOR VALUES FROM ('lower') TO ('upper')`.
    pub fn attach_clause(&self) -> String {
        format!(
            "FOR VALUES FROM ('{}') TO ('{}')",
            self.lower_literal(),
            self.upper_literal()
        )
    }
}

/// Extract the two bound literals from a `pg_get_constraintdef` rendering of
/// a range check constraint.
///
/// PostgreSQL normalizes the stored expression, e.g.
/// `CHECK (((created_at >= '2020-01-01 00:00:00'::timestamp without time
/// zone) AND (created_at < '2024-01-01 00:00:00'::timestamp without time
/// zone)))`, so whole-string comparison against the DDL we issued is useless.
/// The literals themselves survive normalization verbatim, which is exactly
/// the string-for-string comparison the attach step depends on.
///
/// Returns `None` unless the definition contains exactly two quoted
/// literals.
pub fn extract_check_bounds(definition: &str) -> Option<(String, String)> {
    let mut literals = Vec::new();
    let mut chars = definition.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }

        let mut literal = String::new();
        loop {
            match chars.next() {
                // doubled quote inside a literal
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    literal.push('\'');
                }
                Some('\'') => break,
                Some(other) => literal.push(other),
                None => return None,
            }
        }

        literals.push(literal);
    }

    match literals.len() {
        2 => {
            let upper = literals.pop()?;
            let lower = literals.pop()?;
            Some((lower, upper))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bounds() -> PartitionBounds {
        PartitionBounds::new(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn literals_are_canonical() {
        assert_eq!(bounds().lower_literal(), "2020-01-01 00:00:00");
        assert_eq!(bounds().upper_literal(), "2024-01-01 00:00:00");
    }

    #[test]
    fn check_expr_and_attach_clause_share_literals() {
        let b = bounds();
        let expr = b.check_expr("created_at");
        let attach = b.attach_clause();

        assert_eq!(
            expr,
            "(\"created_at\" >= '2020-01-01 00:00:00' AND \"created_at\" < '2024-01-01 00:00:00')"
        );
        assert_eq!(
            attach,
            "FOR VALUES FROM ('2020-01-01 00:00:00') TO ('2024-01-01 00:00:00')"
        );

        for literal in [b.lower_literal(), b.upper_literal()] {
            assert!(expr.contains(&literal));
            assert!(attach.contains(&literal));
        }
    }

    #[test]
    fn extracts_bounds_from_normalized_definition() {
        let def = "CHECK (((created_at >= '2020-01-01 00:00:00'::timestamp without time zone) \
                   AND (created_at < '2024-01-01 00:00:00'::timestamp without time zone)))";

        let (lower, upper) = extract_check_bounds(def).unwrap();
        assert_eq!(lower, "2020-01-01 00:00:00");
        assert_eq!(upper, "2024-01-01 00:00:00");
    }

    #[test]
    fn extracts_bounds_from_not_valid_definition() {
        let def = "CHECK (((created_at >= '2020-01-01 00:00:00'::timestamp without time zone) \
                   AND (created_at < '2024-01-01 00:00:00'::timestamp without time zone))) NOT VALID";

        let (lower, upper) = extract_check_bounds(def).unwrap();
        assert_eq!(lower, "2020-01-01 00:00:00");
        assert_eq!(upper, "2024-01-01 00:00:00");
    }

    #[test]
    fn rejects_definition_without_two_literals() {
        assert!(extract_check_bounds("CHECK ((is_deleted = false))").is_none());
        assert!(extract_check_bounds("CHECK ((status = 'DONE'))").is_none());
        assert!(extract_check_bounds("CHECK (a >= '1' AND a < '2' AND b < '3')").is_none());
    }

    #[test]
    fn handles_doubled_quotes_inside_literals() {
        let def = "CHECK (((note >= 'it''s a' ) AND (note < 'it''s b')))";
        let (lower, upper) = extract_check_bounds(def).unwrap();
        assert_eq!(lower, "it's a");
        assert_eq!(upper, "it's b");
    }

    #[test]
    fn roundtrips_own_rendering() {
        let b = bounds();
        let expr = b.check_expr("created_at");
        let (lower, upper) = extract_check_bounds(&expr).unwrap();
        assert_eq!(lower, b.lower_literal());
        assert_eq!(upper, b.upper_literal());
    }
}
