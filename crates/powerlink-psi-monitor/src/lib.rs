// crates/powerlink-psi-monitor/src/lib.rs
//! Diagnostic monitoring for `powerlink-psi` endpoints.
//!
//! The endpoint loop takes a [`PsiSnapshot`] whenever it likes and hands
//! it to a [`SnapshotPublisher`]. Publishing never blocks: when the
//! consumer falls behind, the snapshot is dropped and counted. The
//! consumer side runs in its own thread and renders each snapshot as one
//! JSON document.

pub mod model;

use log::{debug, info, trace};
use powerlink_psi::PsiSnapshot;

pub use model::DiagnosticSnapshot;

#[cfg(feature = "in-process")]
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Real-time side of the monitor channel.
#[cfg(feature = "in-process")]
pub struct SnapshotPublisher {
    tx: Sender<DiagnosticSnapshot>,
    dropped: u64,
}

#[cfg(feature = "in-process")]
impl SnapshotPublisher {
    /// Offers `snapshot` to the consumer. Returns `false` if it was
    /// dropped because the channel is full or the consumer is gone.
    pub fn publish(&mut self, snapshot: &PsiSnapshot) -> bool {
        match self.tx.try_send(DiagnosticSnapshot::from(snapshot)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!("[Monitor] Consumer busy, snapshot dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                false
            }
        }
    }

    /// Snapshots dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Creates the bounded channel between the endpoint loop and the monitor.
///
/// A capacity of 1 keeps only the freshest pending snapshot.
#[cfg(feature = "in-process")]
pub fn monitor_channel(capacity: usize) -> (SnapshotPublisher, Receiver<DiagnosticSnapshot>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (SnapshotPublisher { tx, dropped: 0 }, rx)
}

/// Runs the non-real-time side of the monitor.
///
/// Blocks until every publisher is dropped, passing each received snapshot
/// to `sink` as a JSON document. Returns the number of snapshots handled.
#[cfg(feature = "in-process")]
pub fn run_in_process_monitor<F>(
    receiver: Receiver<DiagnosticSnapshot>,
    mut sink: F,
) -> Result<u64, serde_json::Error>
where
    F: FnMut(&str),
{
    info!("[Monitor] Listening for snapshots");
    let mut handled = 0;
    while let Ok(snapshot) = receiver.recv() {
        let json = serde_json::to_string(&snapshot)?;
        sink(&json);
        handled += 1;
    }
    debug!("[Monitor] Publisher gone after {} snapshots", handled);
    Ok(handled)
}

#[cfg(all(test, feature = "in-process"))]
mod tests {
    use super::*;
    use powerlink_psi::error::{ErrorEntry, PsiModule};
    use powerlink_psi::psi::{LogChannelSnapshot, SsdoChannelSnapshot};
    use powerlink_psi::ssdo::{ConsTxState, ProdRxState};
    use powerlink_psi::{PsiError, SeqNr, TimeStamp};
    use std::thread;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn snapshot(rel_time: u64) -> PsiSnapshot {
        PsiSnapshot {
            time: TimeStamp::from_u64(rel_time),
            icc_status: SeqNr::Second,
            logbook: vec![LogChannelSnapshot {
                chan_id: 0,
                locked: true,
                seq_nr: SeqNr::Second,
            }],
            ssdo: vec![SsdoChannelSnapshot {
                chan_id: 0,
                tx_state: ConsTxState::WaitForTxFinished,
                rx_state: ProdRxState::WaitForFrame,
                pending_frames: 2,
            }],
            error_count: 1,
            last_error: Some(ErrorEntry {
                module: PsiModule::Stream,
                error: PsiError::TransferError,
            }),
        }
    }

    #[test]
    fn test_snapshot_conversion() {
        let diag = DiagnosticSnapshot::from(&snapshot(5000));
        assert_eq!(diag.rel_time, 5000);
        assert!(diag.icc_busy);
        assert_eq!(diag.logbook[0].seq_nr, 1);
        assert_eq!(diag.ssdo[0].tx_state, "WaitForTxFinished");
        assert_eq!(diag.ssdo[0].pending_frames, 2);
        let error = diag.last_error.unwrap();
        assert_eq!(error.module, "Stream");
        assert_eq!(error.message, "Stream transfer failed");
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(DiagnosticSnapshot::from(&snapshot(7))).unwrap();
        assert_eq!(json["rel_time"], 7);
        assert_eq!(json["logbook"][0]["locked"], true);
        assert_eq!(json["ssdo"][0]["rx_state"], "WaitForFrame");
        assert_eq!(json["last_error"]["module"], "Stream");
    }

    #[test]
    fn test_publish_never_blocks() {
        init_logging();
        let (mut publisher, rx) = monitor_channel(1);
        assert!(publisher.publish(&snapshot(1)));
        assert!(!publisher.publish(&snapshot(2)));
        assert_eq!(publisher.dropped(), 1);
        assert_eq!(rx.recv().unwrap().rel_time, 1);

        drop(rx);
        assert!(!publisher.publish(&snapshot(3)));
        assert_eq!(publisher.dropped(), 2);
    }

    #[test]
    fn test_monitor_runs_until_publisher_is_dropped() {
        init_logging();
        let (mut publisher, rx) = monitor_channel(4);
        let consumer = thread::spawn(move || {
            let mut docs = Vec::new();
            let handled = run_in_process_monitor(rx, |json| docs.push(json.to_string())).unwrap();
            (handled, docs)
        });

        for time in [1000, 2000, 3000] {
            assert!(publisher.publish(&snapshot(time)));
        }
        drop(publisher);

        let (handled, docs) = consumer.join().unwrap();
        assert_eq!(handled, 3);
        assert!(docs[2].contains("\"rel_time\":3000"));
    }
}
