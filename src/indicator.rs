// indicator.rs

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Led {
    /// green, lit while a cycle runs
    Power,
    /// blue, blinks while joining and stays lit when connected
    Wifi,
    /// red, lit after an accepted upload
    Upload,
}

/// Status LEDs. Pure output, nothing reads them back.
pub trait StatusIndicator {
    fn set(&mut self, led: Led, on: bool);

    fn running(&mut self) {
        self.set(Led::Power, true);
        self.set(Led::Wifi, false);
        self.set(Led::Upload, false);
    }

    fn all_off(&mut self) {
        self.set(Led::Upload, false);
        self.set(Led::Wifi, false);
        self.set(Led::Power, false);
    }
}

/// For boards without LEDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set(&mut self, _led: Led, _on: bool) {}
}

// EOF
