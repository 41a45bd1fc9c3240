// crates/powerlink-psi/src/psi.rs
//! The PSI endpoint: one stream, the status channel and every logbook and
//! SSDO channel of a [`PsiConfig`], driven by two entry points.
//!
//! `process_sync` and `process_post_actions` belong to the cyclic
//! interrupt, `process_async` to the background loop. Fatal errors are
//! posted to the [`ErrorManager`] once, by the entry point that observed
//! them.

use crate::common::TimeStamp;
use crate::config::PsiConfig;
use crate::error::{ErrorEntry, ErrorHandler, ErrorManager, PsiModule};
use crate::hal::{PsiError, TransferHandler};
use crate::logbook::{LogChannel, LogEntry, LogTxStatus};
use crate::ssdo::{ConsTxState, ProdRxState, SsdoChannel, SsdoTransport};
use crate::status::{Status, TimeSyncHandler};
use crate::stream::{Stream, SyncCallback};
use crate::types::SeqNr;
use alloc::boxed::Box;
use alloc::vec::Vec;
use log::{error, info};

/// State of one logbook channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogChannelSnapshot {
    pub chan_id: u8,
    pub locked: bool,
    pub seq_nr: SeqNr,
}

/// State of one SSDO channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsdoChannelSnapshot {
    pub chan_id: u8,
    pub tx_state: ConsTxState,
    pub rx_state: ProdRxState,
    pub pending_frames: usize,
}

/// Point-in-time view of an endpoint, cheap enough to take every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiSnapshot {
    pub time: TimeStamp,
    pub icc_status: SeqNr,
    pub logbook: Vec<LogChannelSnapshot>,
    pub ssdo: Vec<SsdoChannelSnapshot>,
    pub error_count: u32,
    pub last_error: Option<ErrorEntry>,
}

pub struct Psi<H>
where
    H: ErrorHandler,
{
    stream: Stream,
    status: Status,
    log_channels: Vec<LogChannel>,
    ssdo_channels: Vec<SsdoChannel>,
    errors: ErrorManager<H>,
}

impl<H> Psi<H>
where
    H: ErrorHandler,
{
    pub fn new(
        config: &PsiConfig,
        transfer: Box<dyn TransferHandler>,
        time_sync: Box<dyn TimeSyncHandler>,
        error_handler: H,
    ) -> Result<Self, PsiError> {
        let mut errors = ErrorManager::new(error_handler);

        errors.check(PsiModule::Internal, config.validate())?;
        let mut stream = errors.check(
            PsiModule::Stream,
            Stream::new(
                config.descriptors(),
                transfer,
                config.cons_ack_id,
                config.prod_ack_id,
            ),
        )?;
        let status = errors.check(
            PsiModule::Status,
            Status::init(
                &mut stream,
                config.status_out_id,
                config.status_in_id,
                time_sync,
            ),
        )?;

        let mut log_channels = Vec::with_capacity(config.log_buffers.len());
        for (chan_id, &buffer) in config.log_buffers.iter().enumerate() {
            let channel = LogChannel::create(chan_id as u8, buffer, &mut stream, &status);
            log_channels.push(errors.check(PsiModule::Logbook, channel)?);
        }

        let mut ssdo_channels = Vec::with_capacity(config.ssdo_buffers.len());
        for (chan_id, buffers) in config.ssdo_buffers.iter().enumerate() {
            let channel = SsdoChannel::create(
                chan_id as u8,
                buffers.consumer,
                buffers.producer,
                &mut stream,
                &status,
            );
            ssdo_channels.push(errors.check(PsiModule::Ssdo, channel)?);
        }

        info!(
            "[PSI] Initialised: {} logbook channel(s), {} SSDO channel(s)",
            log_channels.len(),
            ssdo_channels.len()
        );
        Ok(Self {
            stream,
            status,
            log_channels,
            ssdo_channels,
            errors,
        })
    }

    /// Releases every channel.
    pub fn exit(mut self) {
        for channel in self.log_channels {
            channel.destroy();
        }
        for channel in &mut self.ssdo_channels {
            channel.destroy();
        }
        self.status.exit();
        info!("[PSI] Exit");
    }

    pub fn register_sync_callback(&mut self, callback: Box<dyn SyncCallback>) {
        self.stream.register_sync_callback(callback);
    }

    /// Pre-actions and transfer. Called first in the cyclic interrupt.
    pub fn process_sync(&mut self) -> Result<(), PsiError> {
        let result = self.stream.process_sync();
        self.errors.check(PsiModule::Stream, result)
    }

    /// Post-actions and the synchronous callback.
    pub fn process_post_actions(&mut self) -> Result<(), PsiError> {
        let result = self.stream.process_post_actions();
        self.errors.check(PsiModule::Stream, result)
    }

    /// Runs every channel state machine once. Called from the background
    /// loop.
    pub fn process_async(&mut self, transport: &mut dyn SsdoTransport) -> Result<(), PsiError> {
        for channel in &mut self.log_channels {
            let result = channel.process();
            self.errors.check(PsiModule::Logbook, result)?;
        }
        for channel in &mut self.ssdo_channels {
            if let Err(e) = channel.process(&mut self.stream, transport) {
                error!("[PSI] SSDO channel processing failed: {}", e);
                self.errors.post(PsiModule::Ssdo, e);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn post_log_entry(&mut self, chan_id: u8, entry: &LogEntry) -> Result<LogTxStatus, PsiError> {
        let channel = self
            .log_channels
            .get_mut(chan_id as usize)
            .ok_or(PsiError::InvalidParameter)?;
        channel.post_log_entry(&mut self.stream, entry)
    }

    /// Queues a frame the transport received on SSDO channel `chan_id`.
    pub fn ssdo_receive_frame(&mut self, chan_id: u8, payload: &[u8]) -> Result<(), PsiError> {
        self.ssdo_channels
            .get_mut(chan_id as usize)
            .ok_or(PsiError::InvalidParameter)?
            .rx
            .receive_frame(payload)
    }

    pub fn snapshot(&self) -> PsiSnapshot {
        PsiSnapshot {
            time: self.status.time_stamp(),
            icc_status: self.status.icc_status(),
            logbook: self
                .log_channels
                .iter()
                .map(|c| LogChannelSnapshot {
                    chan_id: c.chan_id(),
                    locked: c.is_locked(),
                    seq_nr: c.seq_nr(),
                })
                .collect(),
            ssdo: self
                .ssdo_channels
                .iter()
                .enumerate()
                .map(|(chan_id, c)| SsdoChannelSnapshot {
                    chan_id: chan_id as u8,
                    tx_state: c.tx.state(),
                    rx_state: c.rx.state(),
                    pending_frames: c.rx.pending_frames(),
                })
                .collect(),
            error_count: self.errors.error_count(),
            last_error: self.errors.last_error(),
        }
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn log_channel(&self, chan_id: u8) -> Option<&LogChannel> {
        self.log_channels.get(chan_id as usize)
    }

    pub fn ssdo_channel(&self, chan_id: u8) -> Option<&SsdoChannel> {
        self.ssdo_channels.get(chan_id as usize)
    }

    pub fn errors(&self) -> &ErrorManager<H> {
        &self.errors
    }
}
