//! Pre-flight gates: the two constraint state machines that must both be
//! terminal before the cutover transaction is allowed to open.

use tracing::{info, warn};

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::inspect::TableInfo;

/// State of the concurrently-built unique index on the widened key.
///
/// `Invalid` covers both a failed concurrent build and a build still in
/// flight; either way the index cannot back a primary-key promotion yet. The
/// catalog is the only place a failed build surfaces - the session that ran
/// it may have disconnected long ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Missing,
    Invalid,
    Valid,
}

/// State of the range check constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Missing,
    NotValid,
    Validated,
}

pub fn index_state(info: &TableInfo, index: &str) -> IndexState {
    match info.index(index) {
        None => IndexState::Missing,
        Some(row) if !row.is_valid => IndexState::Invalid,
        Some(_) => IndexState::Valid,
    }
}

pub fn check_state(info: &TableInfo, constraint: &str) -> CheckState {
    match info.constraint(constraint) {
        None => CheckState::Missing,
        Some(row) if !row.is_validated => CheckState::NotValid,
        Some(_) => CheckState::Validated,
    }
}

/// Combined gate evaluation for one inspection snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Gates {
    pub index: IndexState,
    pub check: CheckState,
}

pub fn gates(info: &TableInfo, config: &MigrationConfig) -> Gates {
    let gates = Gates {
        index: index_state(info, &config.unique_index_name()),
        check: check_state(info, &config.check_constraint_name()),
    };

    info!(
        index = ?gates.index,
        check = ?gates.check,
        table = %info.table,
        "pre-flight gates"
    );

    gates
}

impl Gates {
    /// Both machines must be terminal-valid before cutover. There is no
    /// retry path: an invalid index means a failed concurrent build that an
    /// operator has to drop and rebuild.
    pub fn ensure_cutover_ready(&self, info: &TableInfo, config: &MigrationConfig) -> Result<()> {
        match self.index {
            IndexState::Valid => {}
            IndexState::Missing => {
                return Err(Error::MissingIndex {
                    table: info.table.clone(),
                    index: config.unique_index_name(),
                })
            }
            IndexState::Invalid => {
                warn!(
                    index = %config.unique_index_name(),
                    "concurrent build left an INVALID index behind"
                );
                return Err(Error::InvalidIndex {
                    table: info.table.clone(),
                    index: config.unique_index_name(),
                });
            }
        }

        match self.check {
            CheckState::Validated => Ok(()),
            CheckState::Missing => Err(Error::MissingCheck {
                table: info.table.clone(),
                constraint: config.check_constraint_name(),
            }),
            CheckState::NotValid => Err(Error::UnvalidatedCheck {
                table: info.table.clone(),
                constraint: config.check_constraint_name(),
            }),
        }
    }
}

/// Byte-for-byte comparison of the validated constraint's bound literals
/// against the planned attach bounds.
///
/// A mismatch downgrades `ATTACH PARTITION` from a metadata-only operation
/// into a full validating scan inside the ACCESS EXCLUSIVE window, turning a
/// two-second cutover into an outage proportional to table size. The runbook
/// leaves this to operator discipline; here it is a hard gate.
pub fn ensure_bounds_match(info: &TableInfo, config: &MigrationConfig) -> Result<()> {
    let name = config.check_constraint_name();
    let row = info.constraint(&name).ok_or_else(|| Error::MissingCheck {
        table: info.table.clone(),
        constraint: name.clone(),
    })?;

    let (found_lower, found_upper) =
        repart_sql::bounds::extract_check_bounds(&row.definition).ok_or_else(|| {
            Error::UnparsableBounds {
                constraint: name.clone(),
                definition: row.definition.clone(),
            }
        })?;

    let bounds = config.bounds();
    let (want_lower, want_upper) = (bounds.lower_literal(), bounds.upper_literal());

    if found_lower != want_lower || found_upper != want_upper {
        return Err(Error::BoundsMismatch {
            constraint: name,
            found_lower,
            found_upper,
            want_lower,
            want_upper,
        });
    }

    Ok(())
}
