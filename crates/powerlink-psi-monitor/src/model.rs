//! Defines the data structures handed to the diagnostic consumer.
//!
//! These mirror [`PsiSnapshot`] with plain, serialisable fields so they can
//! cross a thread boundary and be rendered as JSON.

use powerlink_psi::PsiSnapshot;
use powerlink_psi::psi::{LogChannelSnapshot, SsdoChannelSnapshot};
use serde::Serialize;

/// A serializable view of one logbook channel.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LogChannelInfo {
    pub chan_id: u8,
    /// An entry is outstanding and waits for the remote acknowledge.
    pub locked: bool,
    pub seq_nr: u8,
}

impl From<&LogChannelSnapshot> for LogChannelInfo {
    fn from(chan: &LogChannelSnapshot) -> Self {
        Self {
            chan_id: chan.chan_id,
            locked: chan.locked,
            seq_nr: chan.seq_nr.into(),
        }
    }
}

/// A serializable view of both directions of one SSDO channel.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SsdoChannelInfo {
    pub chan_id: u8,
    pub tx_state: String,
    pub rx_state: String,
    pub pending_frames: usize,
}

impl From<&SsdoChannelSnapshot> for SsdoChannelInfo {
    fn from(chan: &SsdoChannelSnapshot) -> Self {
        Self {
            chan_id: chan.chan_id,
            tx_state: format!("{:?}", chan.tx_state),
            rx_state: format!("{:?}", chan.rx_state),
            pending_frames: chan.pending_frames,
        }
    }
}

/// The last error posted to the endpoint's error sink.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorInfo {
    pub module: String,
    pub message: String,
}

/// The main data packet sent from the PSI endpoint to the monitor.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticSnapshot {
    /// Relative time of the cycle the snapshot was taken in.
    pub rel_time: u64,
    /// The remote side reports its internal channels as busy.
    pub icc_busy: bool,
    pub logbook: Vec<LogChannelInfo>,
    pub ssdo: Vec<SsdoChannelInfo>,
    pub error_count: u32,
    pub last_error: Option<ErrorInfo>,
}

impl From<&PsiSnapshot> for DiagnosticSnapshot {
    fn from(snapshot: &PsiSnapshot) -> Self {
        Self {
            rel_time: snapshot.time.as_u64(),
            icc_busy: u8::from(snapshot.icc_status) != 0,
            logbook: snapshot.logbook.iter().map(LogChannelInfo::from).collect(),
            ssdo: snapshot.ssdo.iter().map(SsdoChannelInfo::from).collect(),
            error_count: snapshot.error_count,
            last_error: snapshot.last_error.map(|entry| ErrorInfo {
                module: format!("{:?}", entry.module),
                message: entry.error.to_string(),
            }),
        }
    }
}
