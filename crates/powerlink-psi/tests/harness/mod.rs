// crates/powerlink-psi/tests/harness/mod.rs
//! A simulated remote side for driving a `Psi` endpoint through its
//! transfer handler, the way the communication processor would.

use powerlink_psi::logbook::LogEntry;
use powerlink_psi::ssdo::{SsdoTransport, TxProgress};
use powerlink_psi::{BufferId, HandlerParam, PsiConfig, PsiError, TransferHandler};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::Range;
use std::rc::Rc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The remote end of the shared memory.
pub struct RemoteSide {
    /// Image the local endpoint consumes.
    pub consumer: Vec<u8>,
    /// Last image the local endpoint produced.
    pub producer: Vec<u8>,
    pub rel_time: u64,
    pub transfers: usize,
    /// Consume logbook entries and SSDO frames on every transfer.
    pub auto_ack: bool,
    pub log_entries: Vec<LogEntry>,
    pub ssdo_frames: Vec<Vec<u8>>,
    status_out: Range<usize>,
    ssdo_cons: Range<usize>,
    status_in: Range<usize>,
    ssdo_prod: Range<usize>,
    log: Range<usize>,
}

impl RemoteSide {
    pub fn new(config: &PsiConfig) -> Rc<RefCell<Self>> {
        let descs = config.descriptors();
        let cons_base = descs[config.cons_ack_id.0 as usize].offset;
        let prod_base = descs[config.prod_ack_id.0 as usize].offset;
        let span = |id: BufferId, base: usize| {
            let d = descs[id.0 as usize];
            d.offset - base..d.offset - base + d.size
        };
        let consumer_len = prod_base - cons_base;
        let producer_len = descs.iter().map(|d| d.size).sum::<usize>() - prod_base;

        Rc::new(RefCell::new(Self {
            consumer: vec![0; consumer_len],
            producer: vec![0; producer_len],
            rel_time: 0,
            transfers: 0,
            auto_ack: true,
            log_entries: Vec::new(),
            ssdo_frames: Vec::new(),
            status_out: span(config.status_out_id, cons_base),
            ssdo_cons: span(config.ssdo_buffers[0].consumer, cons_base),
            status_in: span(config.status_in_id, prod_base),
            ssdo_prod: span(config.ssdo_buffers[0].producer, prod_base),
            log: span(config.log_buffers[0], prod_base),
        }))
    }

    /// Transfer handler wired to `remote`.
    pub fn transfer_handler(remote: &Rc<RefCell<Self>>) -> Box<dyn TransferHandler> {
        let remote = remote.clone();
        Box::new(move |param: &mut HandlerParam<'_>| -> Result<(), PsiError> {
            let mut remote = remote.borrow_mut();
            remote.exchange(param);
            Ok(())
        })
    }

    fn exchange(&mut self, param: &mut HandlerParam<'_>) {
        self.transfers += 1;
        self.producer.copy_from_slice(param.producer);
        if self.auto_ack {
            self.consume_log_entry();
            self.consume_ssdo_frame();
        }
        let time = self.rel_time.to_le_bytes();
        let status_out = self.status_out.start;
        self.consumer[status_out..status_out + 8].copy_from_slice(&time);
        self.rel_time += 1000;
        param.consumer.copy_from_slice(&self.consumer);
    }

    fn consume_log_entry(&mut self) {
        let buf = &self.producer[self.log.clone()];
        let seq = buf[0];
        let acked = self.consumer[self.status_out.start + 9] & 0x01;
        if seq != acked {
            self.log_entries.push(LogEntry::deserialize(buf).unwrap());
            self.consumer[self.status_out.start + 9] = seq;
        }
    }

    fn consume_ssdo_frame(&mut self) {
        let buf = &self.producer[self.ssdo_prod.clone()];
        let seq = buf[0] as u16;
        let offset = self.status_out.start + 10;
        let acked = u16::from_le_bytes([self.consumer[offset], self.consumer[offset + 1]]) & 0x01;
        if seq != acked {
            let len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
            self.ssdo_frames.push(buf[4..4 + len].to_vec());
            self.consumer[offset..offset + 2].copy_from_slice(&seq.to_le_bytes());
        }
    }

    /// Publishes an SSDO request with sequence value `seq` (0 or 1).
    pub fn publish_ssdo_request(&mut self, seq: u8, payload: &[u8]) {
        let start = self.ssdo_cons.start;
        self.consumer[start] = seq;
        self.consumer[start + 2..start + 4].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        self.consumer[start + 4..start + 4 + payload.len()].copy_from_slice(payload);
    }

    /// Overwrites the SSDO request header without touching the payload.
    pub fn publish_ssdo_header(&mut self, seq: u8, len: u16) {
        let start = self.ssdo_cons.start;
        self.consumer[start] = seq;
        self.consumer[start + 2..start + 4].copy_from_slice(&len.to_le_bytes());
    }

    /// SSDO receive register the local endpoint published.
    pub fn ssdo_rx_register(&self) -> u16 {
        let start = self.status_in.start;
        u16::from_le_bytes([self.producer[start], self.producer[start + 1]])
    }
}

/// Records transmissions and reports completion after a fixed delay.
#[derive(Default)]
pub struct LoopbackTransport {
    pub sent: Vec<Vec<u8>>,
    pub pending: VecDeque<TxProgress>,
}

impl SsdoTransport for LoopbackTransport {
    fn send(&mut self, _channel: u8, payload: &[u8]) -> Result<(), PsiError> {
        self.sent.push(payload.to_vec());
        Ok(())
    }

    fn poll_tx(&mut self, _channel: u8) -> TxProgress {
        self.pending.pop_front().unwrap_or(TxProgress::Finished)
    }
}
