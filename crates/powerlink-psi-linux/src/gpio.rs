// crates/powerlink-psi-linux/src/gpio.rs
use log::info;
use powerlink_psi::{GpioPort, PsiError};

/// A digital I/O port held in memory.
///
/// Outputs written by the application can be inspected, inputs can be
/// driven, which is all a demo or a test bench needs.
#[derive(Debug, Default)]
pub struct MemoryGpio {
    output_count: u8,
    outputs: u32,
    inputs: u8,
    initialised: bool,
}

impl MemoryGpio {
    pub fn new(output_count: u8) -> Self {
        Self {
            output_count: output_count.min(32),
            ..Self::default()
        }
    }

    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    pub fn set_inputs(&mut self, value: u8) {
        self.inputs = value;
    }
}

impl GpioPort for MemoryGpio {
    fn init(&mut self) -> Result<u8, PsiError> {
        if self.output_count == 0 {
            return Err(PsiError::InvalidParameter);
        }
        self.outputs = 0;
        self.initialised = true;
        info!("[Gpio] {} outputs available", self.output_count);
        Ok(self.output_count)
    }

    fn exit(&mut self) {
        self.outputs = 0;
        self.initialised = false;
    }

    /// Bits above the output count are ignored.
    fn write_output_port(&mut self, value: u32) {
        if !self.initialised {
            return;
        }
        let mask = match self.output_count {
            32 => u32::MAX,
            n => (1u32 << n) - 1,
        };
        self.outputs = value & mask;
    }

    fn read_input_port(&mut self) -> u8 {
        if self.initialised { self.inputs } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_are_masked_to_port_width() {
        let mut gpio = MemoryGpio::new(4);
        assert_eq!(gpio.init(), Ok(4));
        gpio.write_output_port(0xFF);
        assert_eq!(gpio.outputs(), 0x0F);
    }

    #[test]
    fn test_port_is_inert_until_initialised() {
        let mut gpio = MemoryGpio::new(8);
        gpio.set_inputs(0xA5);
        gpio.write_output_port(1);
        assert_eq!(gpio.outputs(), 0);
        assert_eq!(gpio.read_input_port(), 0);

        gpio.init().unwrap();
        assert_eq!(gpio.read_input_port(), 0xA5);
        gpio.exit();
        assert_eq!(gpio.read_input_port(), 0);
    }

    #[test]
    fn test_port_without_outputs_is_rejected() {
        assert_eq!(MemoryGpio::new(0).init(), Err(PsiError::InvalidParameter));
    }
}
