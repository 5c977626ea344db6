//! ADC conversions collected from the end-of-conversion interrupt
//!
//! The interrupt only gathers readings and enqueues finished results. Starting,
//! stopping and taking results happen on the main loop.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::interrupt;
use scan::adc::{Adc, AdcEvents};
use scan::conversion::{Collector, ConversionResult, Converter};
use scan::Error;

const RESULT_Q_SIZE: usize = 4;

// Owned by the ADC interrupt once it is unmasked
static mut COLLECTOR: Collector = Collector::new();
static mut RESULT_PRODUCER: Option<Producer<ConversionResult, RESULT_Q_SIZE>> = None;

pub struct AdcConverter {
    adc: Adc,
    results: Consumer<'static, ConversionResult, RESULT_Q_SIZE>,
}

/// Must be called once, before the ADC interrupt is unmasked
pub fn init(mut adc: Adc) -> AdcConverter {
    static mut RESULT_Q: Queue<ConversionResult, RESULT_Q_SIZE> = Queue::new();

    let (producer, results) = unsafe { RESULT_Q.split() };
    unsafe {
        RESULT_PRODUCER = Some(producer);
    }
    adc.listen();

    AdcConverter { adc, results }
}

impl Converter for AdcConverter {
    fn calibrate(&mut self) -> Result<(), Error> {
        self.adc.calibrate()
    }

    fn start(&mut self) {
        self.adc.start();
    }

    fn stop(&mut self) {
        // No end-of-conversion can fire once the ADC has stopped, so what is
        // left in the collector and queue is all that remains of the sequence
        self.adc.stop();
        cortex_m::interrupt::free(|_| unsafe { COLLECTOR.reset() });
        while self.results.dequeue().is_some() {}
    }

    fn take_result(&mut self) -> Option<ConversionResult> {
        self.results.dequeue()
    }
}

#[interrupt]
fn ADC_COMP() {
    let events = AdcEvents::new();
    let status = events.status();
    let collector = unsafe { &mut COLLECTOR };

    if status.overrun {
        // A reading was lost, so the partial sequence is out of rank
        events.clear_overrun();
        collector.reset();
    }
    if status.end_of_conversion {
        if let Some(result) = collector.push(events.read()) {
            if let Some(producer) = unsafe { RESULT_PRODUCER.as_mut() } {
                producer.enqueue(result).ok();
            }
        }
    }
    if status.end_of_sequence {
        events.clear_end_of_sequence();
    }
}
