mod data_source;
mod sample;

pub use data_source::*;
pub use sample::*;

use super::Values;
use crate::count::{CounterValues, Group};
use crate::ffi::bindings as b;
use crate::ffi::cursor::{Cursor, Truncated};
use crate::result::CounterResult;

/// What the kernel writes into the records of one sampling group.
#[derive(Clone, Debug, Default)]
pub(crate) struct Layout {
    pub sample_type: u64,
    /// Number of registers behind `PERF_SAMPLE_REGS_USER`.
    pub user_registers: usize,
    /// Number of registers behind `PERF_SAMPLE_REGS_INTR`.
    pub kernel_registers: usize,
    /// `(id, name, scale)` of the members reported in [`Sample::counter`].
    pub members: Vec<(u64, String, f64)>,
    pub include_throttle: bool,
}

impl Layout {
    /// Layout of an opened group.
    pub fn new(values: &Values, group: &Group) -> Self {
        let members = group
            .members()
            .iter()
            .filter(|it| values.counters().iter().any(|name| name == it.name()))
            .filter_map(|it| Some((it.id()?, it.name().to_string(), it.config().scale)))
            .collect();

        Self {
            sample_type: values.sample_type(),
            user_registers: values.user_registers_mask().count_ones() as usize,
            kernel_registers: values.kernel_registers_mask().count_ones() as usize,
            members,
            include_throttle: values.is_include_throttle(),
        }
    }

    fn counter_result(&self, values: &CounterValues) -> CounterResult {
        self.members
            .iter()
            .filter_map(|(id, name, scale)| {
                let value = values.value(*id)?;
                Some((name.clone(), value as f64 * scale))
            })
            .collect()
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L837
// struct perf_event_header {
//     u32 type;
//     u16 misc;
//     u16 size;
// };
const HEADER_SIZE: usize = 8;

/// Decodes the records of copied buffer chunks.
///
/// Every chunk holds whole records. A record whose body is shorter than its
/// fields is skipped, a header with an impossible size ends its chunk.
pub(crate) fn decode(chunks: &[Vec<u8>], layout: &Layout) -> Vec<Sample> {
    let mut samples = vec![];

    for chunk in chunks {
        let mut cursor = Cursor::new(chunk);
        while cursor.remaining() >= HEADER_SIZE {
            let (ty, misc, size) = match header(&mut cursor) {
                Ok(header) => header,
                Err(_) => break,
            };
            let Some(len) = (size as usize).checked_sub(HEADER_SIZE) else {
                log::warn!("Record header with size {} at offset {}", size, cursor.pos());
                break;
            };
            let Ok(body) = cursor.bytes(len) else {
                log::warn!("Record of {} bytes exceeds the copied data", size);
                break;
            };

            match record(ty, misc, &mut Cursor::new(body), layout) {
                Ok(Some(sample)) => samples.push(sample),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping malformed record of type {}: {}", ty, e),
            }
        }
    }

    samples
}

fn header(cursor: &mut Cursor<'_>) -> Result<(u32, u16, u16), Truncated> {
    Ok((cursor.u32()?, cursor.u16()?, cursor.u16()?))
}

fn record(ty: u32, misc: u16, body: &mut Cursor<'_>, layout: &Layout) -> Result<Option<Sample>, Truncated> {
    let mut sample = match ty {
        b::PERF_RECORD_SAMPLE => return sample::parse(misc, body, layout).map(Some),

        // struct {
        //     struct perf_event_header header;
        //     u64 id;
        //     u64 lost;
        //     struct sample_id sample_id;
        // };
        b::PERF_RECORD_LOST => {
            let id = body.u64()?;
            let lost = body.u64()?;
            let mut sample = Sample {
                loss: Some(lost),
                ..Default::default()
            };
            sample.metadata.sample_id = Some(id);
            sample
        }

        // struct {
        //     struct perf_event_header header;
        //     u64 lost;
        //     struct sample_id sample_id;
        // };
        b::PERF_RECORD_LOST_SAMPLES => Sample {
            loss: Some(body.u64()?),
            ..Default::default()
        },

        // struct {
        //     struct perf_event_header header;
        //     u64 time;
        //     u64 id;
        //     u64 stream_id;
        //     struct sample_id sample_id;
        // };
        b::PERF_RECORD_THROTTLE | b::PERF_RECORD_UNTHROTTLE => {
            if !layout.include_throttle {
                return Ok(None);
            }
            let mut sample = Sample {
                throttle: Some(Throttle {
                    is_throttle: ty == b::PERF_RECORD_THROTTLE,
                }),
                ..Default::default()
            };
            sample.metadata.timestamp = Some(body.u64()?);
            sample.metadata.sample_id = Some(body.u64()?);
            sample.metadata.stream_id = Some(body.u64()?);
            sample
        }

        // struct {
        //     struct perf_event_header header;
        //     struct sample_id sample_id;
        // };
        b::PERF_RECORD_SWITCH => Sample {
            context_switch: Some(switch(misc, None)),
            ..Default::default()
        },

        // struct {
        //     struct perf_event_header header;
        //     u32 next_prev_pid;
        //     u32 next_prev_tid;
        //     struct sample_id sample_id;
        // };
        b::PERF_RECORD_SWITCH_CPU_WIDE => {
            let task = (body.u32()?, body.u32()?);
            Sample {
                context_switch: Some(switch(misc, Some(task))),
                ..Default::default()
            }
        }

        _ => {
            log::trace!("Ignoring record of type {}", ty);
            return Ok(None);
        }
    };

    sample.metadata.mode = Some(Mode::from_misc(misc));
    sample_id(&mut sample.metadata, body, layout.sample_type)?;
    Ok(Some(sample))
}

fn switch(misc: u16, task: Option<(u32, u32)>) -> ContextSwitch {
    let is_out = misc & b::PERF_RECORD_MISC_SWITCH_OUT != 0;
    ContextSwitch {
        is_out,
        is_preempt: is_out && misc & b::PERF_RECORD_MISC_SWITCH_OUT_PREEMPT != 0,
        process_id: task.map(|(pid, _)| pid),
        thread_id: task.map(|(_, tid)| tid),
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L859
// struct sample_id {
//     { u32 pid, tid;  } && PERF_SAMPLE_TID
//     { u64 time;      } && PERF_SAMPLE_TIME
//     { u64 id;        } && PERF_SAMPLE_ID
//     { u64 stream_id; } && PERF_SAMPLE_STREAM_ID
//     { u32 cpu, res;  } && PERF_SAMPLE_CPU
//     { u64 id;        } && PERF_SAMPLE_IDENTIFIER
// } && perf_event_attr::sample_id_all
//
// Fields already taken from the record body are kept.
fn sample_id(metadata: &mut Metadata, body: &mut Cursor<'_>, sample_type: u64) -> Result<(), Truncated> {
    let has = |flag: u64| sample_type & flag != 0;

    if has(b::PERF_SAMPLE_TID) {
        metadata.process_id = Some(body.u32()?);
        metadata.thread_id = Some(body.u32()?);
    }
    if has(b::PERF_SAMPLE_TIME) {
        let time = body.u64()?;
        metadata.timestamp.get_or_insert(time);
    }
    if has(b::PERF_SAMPLE_ID) {
        let id = body.u64()?;
        metadata.sample_id.get_or_insert(id);
    }
    if has(b::PERF_SAMPLE_STREAM_ID) {
        let stream_id = body.u64()?;
        metadata.stream_id.get_or_insert(stream_id);
    }
    if has(b::PERF_SAMPLE_CPU) {
        metadata.cpu_id = Some(body.u32()?);
        body.skip(size_of::<u32>())?;
    }
    if has(b::PERF_SAMPLE_IDENTIFIER) {
        let id = body.u64()?;
        metadata.sample_id.get_or_insert(id);
    }
    Ok(())
}
