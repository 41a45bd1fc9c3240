//! Runs one PSI endpoint against an in-process remote peer.
//!
//! The endpoint loop is the real-time side: it forwards the input port as
//! logbook entries, mirrors its outputs from the relative time and hands a
//! diagnostic snapshot to the monitor thread every cycle. The parameter
//! set is stored to and restored from a file before the loop starts.
//!
//! Run with `RUST_LOG=debug cargo run -p powerlink-psi-linux --example demo`.

use log::{error, info, warn};
use powerlink_psi::error::LoggingErrorHandler;
use powerlink_psi::logbook::{LogEntry, LogTxStatus};
use powerlink_psi::sodstore::{ProcStoreStatus, SodStore};
use powerlink_psi::ssdo::{SsdoTransport, TxProgress};
use powerlink_psi::{GpioPort, Psi, PsiConfig, PsiError, TimeStamp};
use powerlink_psi_linux::{FileNvs, MemoryGpio, SharedImageLink};
use powerlink_psi_monitor::{monitor_channel, run_in_process_monitor};
use std::cell::Cell;
use std::rc::Rc;
use std::{env, process, thread, time::Duration};

const CYCLE_COUNT: u64 = 50;
const CYCLE_TIME_US: u64 = 1000;

/// Transmits nothing and reports every frame as sent.
struct NullTransport;

impl SsdoTransport for NullTransport {
    fn send(&mut self, channel: u8, payload: &[u8]) -> Result<(), PsiError> {
        info!("[Demo] SSDO channel {} sends {} bytes", channel, payload.len());
        Ok(())
    }

    fn poll_tx(&mut self, _channel: u8) -> TxProgress {
        TxProgress::Finished
    }
}

fn main() {
    env_logger::try_init().ok();

    if let Err(e) = restore_parameters() {
        error!("[Demo] Parameter storage failed: {}", e);
        process::exit(1);
    }

    let (mut publisher, snapshots) = monitor_channel(1);
    let monitor = thread::spawn(move || run_in_process_monitor(snapshots, |json| println!("{json}")));

    if let Err(e) = run_endpoint(&mut publisher) {
        error!("[Demo] Endpoint failed: {}", e);
        process::exit(1);
    }
    info!("[Demo] {} snapshots dropped", publisher.dropped());
    drop(publisher);

    match monitor.join() {
        Ok(Ok(count)) => info!("[Demo] Monitor rendered {} snapshots", count),
        Ok(Err(e)) => error!("[Demo] Monitor failed: {}", e),
        Err(_) => error!("[Demo] Monitor thread panicked"),
    }
}

/// Stores a parameter set on first start and reads it back.
fn restore_parameters() -> Result<(), PsiError> {
    let path = env::temp_dir().join("powerlink-psi-demo.nvs");
    let mut sod = SodStore::init(FileNvs::new(&path, 1024), LoggingErrorHandler)?;

    if let Some(image) = sod.sod_image() {
        info!("[Demo] Restored {} byte parameter set", image.len());
    } else {
        let params: Vec<u8> = (0u8..=255).collect();
        sod.prepare_storage()?;
        while sod.process(&params)? == ProcStoreStatus::Busy {}
        info!("[Demo] Stored {} byte parameter set", params.len());
    }
    sod.close();
    Ok(())
}

fn run_endpoint(publisher: &mut powerlink_psi_monitor::SnapshotPublisher) -> Result<(), PsiError> {
    let config = PsiConfig::default_layout();
    let link = SharedImageLink::new(&config)?;
    let peer = link.peer();

    let mut psi = Psi::new(
        &config,
        link.transfer_handler(),
        Box::new(|time: &TimeStamp| -> Result<(), PsiError> {
            log::trace!("[Demo] Relative time {}", time.as_u64());
            Ok(())
        }),
        LoggingErrorHandler,
    )?;

    let sync_cycles = Rc::new(Cell::new(0u64));
    let counter = sync_cycles.clone();
    psi.register_sync_callback(Box::new(move || -> Result<(), PsiError> {
        counter.set(counter.get() + 1);
        Ok(())
    }));

    let mut gpio = MemoryGpio::new(8);
    let outputs = gpio.init()?;
    info!("[Demo] Driving {} outputs", outputs);

    let mut last_inputs = 0u8;
    for cycle in 0..CYCLE_COUNT {
        // Remote side: publish the time, consume the logbook.
        peer.set_rel_time(&TimeStamp::from_u64(cycle * CYCLE_TIME_US))?;
        if let Some(entry) = peer.take_log_entry(0)? {
            info!("[Demo] Remote received logbook entry {:?}", entry);
        }

        // Synchronous part of the cycle.
        psi.process_sync()?;
        psi.process_post_actions()?;
        let time = psi.status().time_stamp();
        gpio.write_output_port((time.as_u64() / CYCLE_TIME_US) as u32);

        // Background part.
        gpio.set_inputs((cycle / 10) as u8);
        let inputs = gpio.read_input_port();
        if inputs != last_inputs {
            let entry = LogEntry {
                level: 1,
                entry_type: 0,
                code: 0x1000,
                timestamp: time.rel_time_low,
                value: inputs as u32,
            };
            match psi.post_log_entry(0, &entry)? {
                LogTxStatus::Successful => last_inputs = inputs,
                LogTxStatus::Busy => warn!("[Demo] Logbook busy, retrying next cycle"),
            }
        }
        psi.process_async(&mut NullTransport)?;

        publisher.publish(&psi.snapshot());
        thread::sleep(Duration::from_micros(CYCLE_TIME_US));
    }

    info!("[Demo] {} synchronous cycles completed", sync_cycles.get());
    gpio.exit();
    psi.exit();
    Ok(())
}
