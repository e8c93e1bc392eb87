//! Battery-select relay driver.
//!
//! De-energised routes battery 1 through the charge path, energised routes
//! battery 2.  The relay only moves on a `Finished` transition.

use embedded_hal::digital::{Error as _, OutputPin};
use log::{info, warn};

pub struct RelayDriver<P: OutputPin> {
    pin: P,
    energised: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    /// Wrap `pin` and release the coil.
    pub fn new(pin: P) -> Self {
        let mut this = Self {
            pin,
            energised: true,
        };
        this.set(false);
        this
    }

    pub fn set(&mut self, energised: bool) {
        if energised == self.energised {
            return;
        }
        let res = if energised {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match res {
            Ok(()) => {
                self.energised = energised;
                info!("relay: battery {} selected", if energised { 2 } else { 1 });
            }
            Err(e) => warn!("relay: pin write failed ({:?})", e.kind()),
        }
    }

    pub fn is_energised(&self) -> bool {
        self.energised
    }
}
