//! Register level driver for the STM32F0 ADC
//!
//! The converter runs one software-triggered sequence over a fixed channel
//! mask per `start`, lowest channel first. `WAIT` mode holds each following
//! conversion until the data register has been read, so readings cannot be
//! overwritten before the interrupt collects them.
//!
//! The ADC and RCC registers are accessed directly rather than through the
//! PAC singleton. Nothing else in the application may touch the ADC.

use stm32f0::stm32f0x1 as pac;

use crate::Error;

const ISR_ADRDY: u32 = 1 << 0;
const ISR_EOC: u32 = 1 << 2;
const ISR_EOSEQ: u32 = 1 << 3;
const ISR_OVR: u32 = 1 << 4;

const CR_ADEN: u32 = 1 << 0;
const CR_ADSTART: u32 = 1 << 2;
const CR_ADSTP: u32 = 1 << 4;
const CR_ADCAL: u32 = 1 << 31;

const CFGR1_WAIT: u32 = 1 << 14;
/// PCLK / 4, which keeps the ADC clock under 14 MHz with a 48 MHz PCLK
const CFGR2_CKMODE_PCLK_DIV4: u32 = 0b10 << 30;

/// Spin budget for calibration, enable and stop
const SPIN_LIMIT: u32 = 100_000;

/// Sampling time in ADC clock cycles
#[derive(Clone, Copy, Debug)]
pub enum SampleTime {
    T1_5 = 0b000,
    T7_5 = 0b001,
    T13_5 = 0b010,
    T28_5 = 0b011,
    T41_5 = 0b100,
    T55_5 = 0b101,
    T71_5 = 0b110,
    T239_5 = 0b111,
}

pub struct Adc {
    adc: &'static pac::adc::RegisterBlock,
}

impl Adc {
    /// Enable and configure the ADC. Must not be called with the ADC enabled.
    ///
    /// channel_mask: bit n selects ADC_INn; results arrive in ascending order
    pub fn new(channel_mask: u32, sample_time: SampleTime) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.adcen().set_bit());
        rcc.apb2rstr.modify(|_, w| w.adcrst().set_bit());
        rcc.apb2rstr.modify(|_, w| w.adcrst().clear_bit());

        let adc = unsafe { &*pac::ADC::ptr() };

        // 12 bit, right aligned, upward scan, single sequence, software trigger
        adc.cfgr1.write(|w| unsafe { w.bits(CFGR1_WAIT) });
        adc.cfgr2.write(|w| unsafe { w.bits(CFGR2_CKMODE_PCLK_DIV4) });
        adc.smpr.write(|w| unsafe { w.bits(sample_time as u32) });
        adc.chselr.write(|w| unsafe { w.bits(channel_mask & 0x3FFFF) });

        Self { adc }
    }

    /// Interrupt on each end of conversion and on overrun
    pub fn listen(&mut self) {
        self.adc.ier.write(|w| unsafe { w.bits(ISR_EOC | ISR_OVR) });
    }

    fn spin_until(
        &self,
        done: impl Fn(&pac::adc::RegisterBlock) -> bool,
        err: Error,
    ) -> Result<(), Error> {
        for _ in 0..SPIN_LIMIT {
            if done(self.adc) {
                return Ok(());
            }
        }
        Err(err)
    }

    /// Calibrate, then enable. Must be called once before the first `start`.
    pub fn calibrate(&mut self) -> Result<(), Error> {
        // Calibration is only allowed with the ADC disabled
        if self.adc.cr.read().bits() & CR_ADEN != 0 {
            return Err(Error::Calibration);
        }
        self.adc.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_ADCAL) });
        self.spin_until(|adc| adc.cr.read().bits() & CR_ADCAL == 0, Error::Calibration)?;

        self.adc.isr.write(|w| unsafe { w.bits(ISR_ADRDY) });
        self.adc.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_ADEN) });
        self.spin_until(|adc| adc.isr.read().bits() & ISR_ADRDY != 0, Error::AdcNotReady)
    }

    pub fn start(&mut self) {
        self.adc.isr.write(|w| unsafe { w.bits(ISR_EOC | ISR_EOSEQ | ISR_OVR) });
        self.adc.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_ADSTART) });
    }

    /// Abort a running sequence and leave the ADC ready for the next `start`
    ///
    /// A sequence parked in `WAIT` mode holds its last reading in DR and never
    /// restarts until DR is read, so DR is always read here.
    pub fn stop(&mut self) {
        if self.adc.cr.read().bits() & CR_ADSTART != 0 {
            self.adc.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_ADSTP) });
            // An ADC that never stops shows up as a stall on the next cycle
            self.spin_until(|adc| adc.cr.read().bits() & CR_ADSTART == 0, Error::AdcNotReady)
                .ok();
        }
        let _ = self.adc.dr.read().bits();
        self.adc.isr.write(|w| unsafe { w.bits(ISR_EOC | ISR_EOSEQ | ISR_OVR) });
    }
}

/// Interrupt status of the ADC
#[derive(Clone, Copy, Debug)]
pub struct Status {
    pub end_of_conversion: bool,
    pub end_of_sequence: bool,
    pub overrun: bool,
}

/// Interrupt-side access to the ADC: status, data and flag clearing only
pub struct AdcEvents {
    adc: &'static pac::adc::RegisterBlock,
}

impl AdcEvents {
    pub fn new() -> Self {
        Self {
            adc: unsafe { &*pac::ADC::ptr() },
        }
    }

    pub fn status(&self) -> Status {
        let isr = self.adc.isr.read().bits();
        Status {
            end_of_conversion: isr & ISR_EOC != 0,
            end_of_sequence: isr & ISR_EOSEQ != 0,
            overrun: isr & ISR_OVR != 0,
        }
    }

    /// Read the last conversion. Clears the end-of-conversion flag.
    pub fn read(&self) -> u16 {
        self.adc.dr.read().bits() as u16
    }

    pub fn clear_end_of_sequence(&self) {
        self.adc.isr.write(|w| unsafe { w.bits(ISR_EOSEQ) });
    }

    pub fn clear_overrun(&self) {
        self.adc.isr.write(|w| unsafe { w.bits(ISR_OVR) });
    }
}
