// crates/powerlink-psi/src/config.rs
use crate::hal::PsiError;
use crate::logbook::LOG_BUFFER_SIZE;
use crate::ssdo::SSDO_BUFFER_SIZE;
use crate::status::{STATUS_IN_SIZE, STATUS_OUT_SIZE};
use crate::stream::BufferDescriptor;
use crate::types::{ACK_REGISTER_SIZE, BufferId, LOG_CHANNEL_COUNT, MAX_BUFFER_COUNT, SSDO_CHANNEL_COUNT};
use alloc::vec::Vec;

/// Buffers of one SSDO channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsdoBuffers {
    /// Frames published by the remote side.
    pub consumer: BufferId,
    /// Frames posted to the remote side.
    pub producer: BufferId,
}

/// Shared-memory layout of one PSI endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiConfig {
    /// Buffer sizes in id order. Buffers are laid out back to back.
    pub buffer_sizes: Vec<usize>,
    pub cons_ack_id: BufferId,
    pub prod_ack_id: BufferId,
    pub status_out_id: BufferId,
    pub status_in_id: BufferId,
    pub log_buffers: [BufferId; LOG_CHANNEL_COUNT],
    pub ssdo_buffers: [SsdoBuffers; SSDO_CHANNEL_COUNT],
}

impl PsiConfig {
    /// The reference layout: status, one SSDO channel and one logbook
    /// channel.
    pub fn default_layout() -> Self {
        Self {
            buffer_sizes: alloc::vec![
                ACK_REGISTER_SIZE,
                STATUS_OUT_SIZE,
                SSDO_BUFFER_SIZE,
                ACK_REGISTER_SIZE,
                STATUS_IN_SIZE,
                SSDO_BUFFER_SIZE,
                LOG_BUFFER_SIZE,
            ],
            cons_ack_id: BufferId(0),
            prod_ack_id: BufferId(3),
            status_out_id: BufferId(1),
            status_in_id: BufferId(4),
            log_buffers: [BufferId(6)],
            ssdo_buffers: [SsdoBuffers {
                consumer: BufferId(2),
                producer: BufferId(5),
            }],
        }
    }

    /// Checks the ack registers. Per-channel buffers are checked by the
    /// channels themselves.
    pub fn validate(&self) -> Result<(), PsiError> {
        let count = self.buffer_sizes.len();
        if count == 0 || count > MAX_BUFFER_COUNT {
            return Err(PsiError::InvalidParameter);
        }
        if self.cons_ack_id.index() >= count
            || self.prod_ack_id.index() >= count
            || self.cons_ack_id >= self.prod_ack_id
        {
            return Err(PsiError::InvalidParameter);
        }
        for ack in [self.cons_ack_id, self.prod_ack_id] {
            if self.buffer_sizes[ack.index()] == 0 {
                return Err(PsiError::InvalidBuffer);
            }
        }
        Ok(())
    }

    pub fn descriptors(&self) -> Vec<BufferDescriptor> {
        BufferDescriptor::layout(&self.buffer_sizes)
    }

    /// Ids of every buffer in the consumer image.
    pub fn consumer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        (self.cons_ack_id.0..self.prod_ack_id.0).map(BufferId)
    }
}

impl Default for PsiConfig {
    fn default() -> Self {
        Self::default_layout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let config = PsiConfig::default_layout();
        assert_eq!(config.validate(), Ok(()));
        let descs = config.descriptors();
        assert_eq!(descs.len(), 7);
        assert_eq!(descs[3].offset, 4 + 12 + 256);
        assert_eq!(config.consumer_ids().count(), 3);
    }

    #[test]
    fn test_validate_rejects_bad_ack_ids() {
        let mut config = PsiConfig::default_layout();
        config.prod_ack_id = BufferId(7);
        assert_eq!(config.validate(), Err(PsiError::InvalidParameter));

        let mut config = PsiConfig::default_layout();
        config.cons_ack_id = BufferId(3);
        assert_eq!(config.validate(), Err(PsiError::InvalidParameter));

        let mut config = PsiConfig::default_layout();
        config.buffer_sizes[0] = 0;
        assert_eq!(config.validate(), Err(PsiError::InvalidBuffer));

        let mut config = PsiConfig::default_layout();
        config.buffer_sizes.clear();
        assert_eq!(config.validate(), Err(PsiError::InvalidParameter));
    }
}
