// crates/powerlink-psi/src/stream/mod.rs
//! The stream owns every triple buffer of the interface as one contiguous
//! image and drives the cyclic exchange: pre-actions, the physical
//! transfer, post-actions and finally the synchronous callback.
//!
//! Channel modules never talk to the transfer handler. They attach
//! [`BufferAction`]s to the buffers they own.

pub mod action;

pub use action::{ActionType, BufferAction, SyncCallback};

use crate::hal::{PsiError, TransferHandler};
use crate::types::{BufferId, MAX_BUFFER_COUNT};
use action::{ActionEntry, ActionList};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;
use log::{debug, error, info, trace};

/// Location of one triple buffer inside the stream image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub id: BufferId,
    /// Offset of the first byte in the stream image.
    pub offset: usize,
    pub size: usize,
}

impl BufferDescriptor {
    /// Lays out buffers of the given sizes back to back, starting at id 0.
    pub fn layout(sizes: &[usize]) -> Vec<BufferDescriptor> {
        let mut offset = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(index, &size)| {
                let desc = BufferDescriptor {
                    id: BufferId(index as u8),
                    offset,
                    size,
                };
                offset += size;
                desc
            })
            .collect()
    }

    fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// The two images the transfer handler moves each cycle.
///
/// `consumer` receives what the remote side published; `producer` holds what
/// the local channels posted for the remote side.
pub struct HandlerParam<'a> {
    pub consumer: &'a mut [u8],
    pub producer: &'a [u8],
}

pub struct Stream {
    descriptors: Vec<BufferDescriptor>,
    image: Vec<u8>,
    consumer: Range<usize>,
    producer: Range<usize>,
    handler: Box<dyn TransferHandler>,
    pre_actions: ActionList,
    post_actions: ActionList,
    sync_callback: Option<Box<dyn SyncCallback>>,
}

impl Stream {
    /// Builds the stream over `descriptors`.
    ///
    /// The consumer image spans the buffers from `cons_ack_id` up to
    /// `prod_ack_id`, the producer image spans `prod_ack_id` to the last
    /// buffer.
    pub fn new(
        descriptors: Vec<BufferDescriptor>,
        handler: Box<dyn TransferHandler>,
        cons_ack_id: BufferId,
        prod_ack_id: BufferId,
    ) -> Result<Self, PsiError> {
        let count = descriptors.len();
        if count == 0 || count > MAX_BUFFER_COUNT {
            error!("[Stream] Invalid buffer count {}", count);
            return Err(PsiError::InvalidParameter);
        }

        let mut expected_offset = 0;
        for (index, desc) in descriptors.iter().enumerate() {
            if desc.id.index() != index || desc.offset != expected_offset || desc.size == 0 {
                error!("[Stream] Buffer {} breaks the contiguous layout", desc.id);
                return Err(PsiError::InvalidBuffer);
            }
            expected_offset += desc.size;
        }

        if prod_ack_id.index() >= count || cons_ack_id >= prod_ack_id {
            error!(
                "[Stream] Invalid ack ids: consumer {}, producer {} (count {})",
                cons_ack_id, prod_ack_id, count
            );
            return Err(PsiError::InvalidParameter);
        }

        let consumer = image_span(&descriptors, cons_ack_id.index(), prod_ack_id.index());
        let producer = image_span(&descriptors, prod_ack_id.index(), count);
        info!(
            "[Stream] Initialised {} buffers: consumer image {} bytes, producer image {} bytes",
            count,
            consumer.len(),
            producer.len()
        );

        Ok(Self {
            image: vec![0; expected_offset],
            descriptors,
            consumer,
            producer,
            handler,
            pre_actions: ActionList::with_capacity(count),
            post_actions: ActionList::with_capacity(count),
            sync_callback: None,
        })
    }

    /// Drops every registered action and the synchronous callback.
    pub fn reset(&mut self) {
        self.pre_actions.clear();
        self.post_actions.clear();
        self.sync_callback = None;
        debug!("[Stream] Action lists cleared");
    }

    /// Attaches `action` to `buffer`. Actions run in registration order.
    pub fn register_action(
        &mut self,
        kind: ActionType,
        buffer: BufferId,
        action: Box<dyn BufferAction>,
    ) -> Result<(), PsiError> {
        if self.buffer_param(buffer).is_none() {
            return Err(PsiError::InvalidParameter);
        }
        let list = match kind {
            ActionType::Pre => &mut self.pre_actions,
            ActionType::Post => &mut self.post_actions,
        };
        list.insert(ActionEntry { buffer, action })?;
        trace!(
            "[Stream] Registered {:?} action on {} ({} in list)",
            kind,
            buffer,
            list.len()
        );
        Ok(())
    }

    pub fn register_sync_callback(&mut self, callback: Box<dyn SyncCallback>) {
        self.sync_callback = Some(callback);
    }

    pub fn buffer_param(&self, buffer: BufferId) -> Option<&BufferDescriptor> {
        self.descriptors.get(buffer.index())
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<&[u8]> {
        let desc = self.buffer_param(buffer)?;
        self.image.get(desc.range())
    }

    pub fn buffer_mut(&mut self, buffer: BufferId) -> Option<&mut [u8]> {
        let range = self.buffer_param(buffer)?.range();
        self.image.get_mut(range)
    }

    pub fn buffer_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn consumer_image_size(&self) -> usize {
        self.consumer.len()
    }

    pub fn producer_image_size(&self) -> usize {
        self.producer.len()
    }

    /// Runs the pre-actions and, if all of them succeed, the transfer.
    pub fn process_sync(&mut self) -> Result<(), PsiError> {
        call_actions(
            &mut self.pre_actions,
            &self.descriptors,
            &mut self.image,
            ActionType::Pre,
        )?;

        // The producer image always follows the consumer image.
        let (head, tail) = self.image.split_at_mut(self.producer.start);
        let mut param = HandlerParam {
            consumer: &mut head[self.consumer.clone()],
            producer: &tail[..self.producer.len()],
        };
        self.handler.transfer(&mut param).map_err(|e| {
            error!("[Stream] Transfer handler failed: {}", e);
            PsiError::TransferError
        })
    }

    /// Runs the post-actions, then the synchronous callback.
    pub fn process_post_actions(&mut self) -> Result<(), PsiError> {
        call_actions(
            &mut self.post_actions,
            &self.descriptors,
            &mut self.image,
            ActionType::Post,
        )?;

        match self.sync_callback.as_mut() {
            Some(callback) => callback.on_sync().map_err(|e| {
                error!("[Stream] Synchronous callback failed: {}", e);
                PsiError::SyncCallbackFailed
            }),
            None => Ok(()),
        }
    }
}

/// Sums the buffers `[first, last)` into one contiguous span.
fn image_span(descriptors: &[BufferDescriptor], first: usize, last: usize) -> Range<usize> {
    let start = descriptors[first].offset;
    let size: usize = descriptors[first..last].iter().map(|d| d.size).sum();
    start..start + size
}

fn call_actions(
    list: &mut ActionList,
    descriptors: &[BufferDescriptor],
    image: &mut [u8],
    kind: ActionType,
) -> Result<(), PsiError> {
    for entry in list.iter_mut() {
        let range = descriptors[entry.buffer.index()].range();
        if let Err(e) = entry.action.invoke(&mut image[range]) {
            debug!("[Stream] {:?} action on {} failed: {}", kind, entry.buffer, e);
            return Err(e);
        }
    }
    Ok(())
}
