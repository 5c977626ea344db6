use crate::pac;
use crate::hal::rcc::Rcc;

/// TIM2 as the periodic scan tick source
pub struct TickTimer {
    tim: pac::TIM2,
    clk_freq: u32,
}

impl TickTimer {
    pub fn new(tim: pac::TIM2, rcc: &mut Rcc, tick_freq: u32) -> Self {
        let rccregs = unsafe { pac::Peripherals::steal().RCC };
        rccregs.apb1enr.modify(|_, w| w.tim2en().set_bit());

        // If pclk is prescaled from hclk, the frequency fed into the timers is doubled
        let clk_freq = if rcc.clocks.hclk().0 == rcc.clocks.pclk().0 {
            rcc.clocks.pclk().0
        } else {
            rcc.clocks.pclk().0 * 2
        };

        let mut obj = Self {
            tim,
            clk_freq
        };
        obj.set_tick_freq(tick_freq);
        // Load ARR now so the first period is already the configured one
        obj.tim.egr.write(|w| w.ug().set_bit());
        obj.clear_irq();

        obj.tim.cr1.modify(|_, w| {
            w.cen().set_bit()
            .arpe().set_bit()
        });
        obj
    }

    pub fn listen(&mut self) {
        self.tim.dier.write(|w| w.uie().set_bit());
    }

    /// TIM2 is 32 bits wide, so 1 Hz at 48 MHz needs no prescaler
    pub fn set_tick_freq(&mut self, tick_freq: u32) {
        let arr = self.clk_freq / tick_freq;
        self.tim.arr.write(|w| w.arr().bits(arr));
    }

    /// Acknowledge the update interrupt
    pub fn clear_irq(&mut self) {
        self.tim.sr.write(|w| unsafe { w.bits(0) });
    }
}
