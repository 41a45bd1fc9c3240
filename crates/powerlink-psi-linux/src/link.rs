// crates/powerlink-psi-linux/src/link.rs
//! An in-process stand-in for the physical stream transfer.
//!
//! [`SharedImageLink`] owns the remote copies of both stream images. The
//! transfer handler it hands out copies the local producer image into the
//! remote copy and the remote consumer image into the local one, the same
//! exchange a DMA or SPI transfer performs. [`RemotePeer`] plays the
//! communication processor on the other end.

use log::{debug, trace};
use powerlink_psi::logbook::LogEntry;
use powerlink_psi::{
    BufferDescriptor, BufferId, HandlerParam, PsiConfig, PsiError, TimeStamp, TransferHandler,
};
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

// Fields of the consumed status buffer the peer maintains.
const REL_TIME_OFF: usize = 0;
const LOG_CONS_STATUS_OFF: usize = 9;

struct Images {
    descriptors: Vec<BufferDescriptor>,
    consumer_base: usize,
    producer_base: usize,
    consumer: Vec<u8>,
    producer: Vec<u8>,
    transfers: u64,
}

impl Images {
    fn span(&self, id: BufferId, base: usize, image_len: usize) -> Result<Range<usize>, PsiError> {
        let desc = self
            .descriptors
            .get(id.index())
            .ok_or(PsiError::InvalidParameter)?;
        let start = desc
            .offset
            .checked_sub(base)
            .ok_or(PsiError::InvalidParameter)?;
        let range = start..start + desc.size;
        if range.end > image_len {
            return Err(PsiError::InvalidParameter);
        }
        Ok(range)
    }

    fn consumer_span(&self, id: BufferId) -> Result<Range<usize>, PsiError> {
        self.span(id, self.consumer_base, self.consumer.len())
    }

    fn producer_span(&self, id: BufferId) -> Result<Range<usize>, PsiError> {
        self.span(id, self.producer_base, self.producer.len())
    }

    fn exchange(&mut self, param: &mut HandlerParam<'_>) -> Result<(), PsiError> {
        if param.consumer.len() != self.consumer.len() {
            return Err(PsiError::BufferSizeMismatch {
                expected: self.consumer.len(),
                actual: param.consumer.len(),
            });
        }
        if param.producer.len() != self.producer.len() {
            return Err(PsiError::BufferSizeMismatch {
                expected: self.producer.len(),
                actual: param.producer.len(),
            });
        }
        self.producer.copy_from_slice(param.producer);
        param.consumer.copy_from_slice(&self.consumer);
        self.transfers += 1;
        trace!("[Link] Transfer #{}", self.transfers);
        Ok(())
    }
}

/// Both stream images of one endpoint, as seen from the remote side.
#[derive(Clone)]
pub struct SharedImageLink {
    images: Rc<RefCell<Images>>,
    status_out_id: BufferId,
    log_buffers: Vec<BufferId>,
}

impl SharedImageLink {
    /// Sizes the remote images after `config`.
    pub fn new(config: &PsiConfig) -> Result<Self, PsiError> {
        config.validate()?;
        let descriptors = config.descriptors();
        let consumer_base = descriptors[config.cons_ack_id.index()].offset;
        let producer_base = descriptors[config.prod_ack_id.index()].offset;
        let total: usize = descriptors.iter().map(|d| d.size).sum();
        debug!(
            "[Link] Consumer image {} bytes, producer image {} bytes",
            producer_base - consumer_base,
            total - producer_base
        );
        Ok(Self {
            images: Rc::new(RefCell::new(Images {
                consumer: vec![0; producer_base - consumer_base],
                producer: vec![0; total - producer_base],
                descriptors,
                consumer_base,
                producer_base,
                transfers: 0,
            })),
            status_out_id: config.status_out_id,
            log_buffers: config.log_buffers.to_vec(),
        })
    }

    /// The transfer handler to pass to the local endpoint.
    pub fn transfer_handler(&self) -> Box<dyn TransferHandler> {
        let images = self.images.clone();
        Box::new(move |param: &mut HandlerParam<'_>| -> Result<(), PsiError> {
            images.borrow_mut().exchange(param)
        })
    }

    /// The remote end of the link.
    pub fn peer(&self) -> RemotePeer {
        RemotePeer { link: self.clone() }
    }
}

/// Operations of the communication processor on the shared images.
pub struct RemotePeer {
    link: SharedImageLink,
}

impl RemotePeer {
    /// Number of transfers performed so far.
    pub fn transfers(&self) -> u64 {
        self.link.images.borrow().transfers
    }

    /// Writes `data` at `offset` into consumed buffer `id`. Visible to the
    /// local endpoint after the next transfer.
    pub fn publish(&self, id: BufferId, offset: usize, data: &[u8]) -> Result<(), PsiError> {
        let mut images = self.link.images.borrow_mut();
        let span = images.consumer_span(id)?;
        let start = span.start + offset;
        if offset + data.len() > span.len() {
            return Err(PsiError::OutOfBounds);
        }
        images.consumer[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy of produced buffer `id` as of the last transfer.
    pub fn produced(&self, id: BufferId) -> Result<Vec<u8>, PsiError> {
        let images = self.link.images.borrow();
        let span = images.producer_span(id)?;
        Ok(images.producer[span].to_vec())
    }

    /// Publishes the relative time of the next cycle.
    pub fn set_rel_time(&self, time: &TimeStamp) -> Result<(), PsiError> {
        self.publish(
            self.link.status_out_id,
            REL_TIME_OFF,
            &time.as_u64().to_le_bytes(),
        )
    }

    /// Takes the outstanding entry of logbook channel `chan_id`, if the
    /// local endpoint posted one, and acknowledges it.
    pub fn take_log_entry(&self, chan_id: u8) -> Result<Option<LogEntry>, PsiError> {
        let buffer = *self
            .link
            .log_buffers
            .get(chan_id as usize)
            .ok_or(PsiError::InvalidParameter)?;
        let produced = self.produced(buffer)?;
        let seq = produced.first().copied().ok_or(PsiError::InvalidBuffer)? & 0x01;

        let mut images = self.link.images.borrow_mut();
        let status = images.consumer_span(self.link.status_out_id)?;
        let flags = &mut images.consumer[status.start + LOG_CONS_STATUS_OFF];
        let mask = 1u8 << chan_id;
        let acked = (*flags & mask) >> chan_id;
        if seq == acked {
            return Ok(None);
        }
        *flags = (*flags & !mask) | (seq << chan_id);
        drop(images);

        let entry = LogEntry::deserialize(&produced)?;
        debug!("[Link] Logbook channel {} delivered {:?}", chan_id, entry);
        Ok(Some(entry))
    }
}
