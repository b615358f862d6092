use arrayvec::ArrayVec;

use super::group::MAX_MEMBERS;
use crate::ffi::cursor::{Cursor, Truncated};

/// One read of a counter group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub time_enabled: u64,
    pub time_running: u64,
    /// `(value, id)` of each member.
    pub values: ArrayVec<(u64, u64), MAX_MEMBERS>,
}

impl CounterValues {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L344
    // struct read_format {
    //     u64 nr;
    //     u64 time_enabled;
    //     u64 time_running;
    //     { u64 value; u64 id; } cntr[nr];
    // };
    pub(crate) fn parse(cursor: &mut Cursor<'_>) -> Result<Self, Truncated> {
        let nr = cursor.u64()?;
        let time_enabled = cursor.u64()?;
        let time_running = cursor.u64()?;

        let mut values = ArrayVec::new();
        for _ in 0..nr {
            let value = cursor.u64()?;
            let id = cursor.u64()?;
            // Entries are still consumed so that the following fields line up.
            if values.try_push((value, id)).is_err() {
                log::warn!("Ignoring counter {} of a group of at most {} counters", id, MAX_MEMBERS);
            }
        }

        Ok(Self {
            time_enabled,
            time_running,
            values,
        })
    }

    /// Size of a read of `members` counters.
    pub(crate) fn read_size(members: usize) -> usize {
        (3 + 2 * members) * size_of::<u64>()
    }

    pub fn value(&self, id: u64) -> Option<u64> {
        self.values
            .iter()
            .find(|(_, it)| *it == id)
            .map(|(value, _)| *value)
    }
}
