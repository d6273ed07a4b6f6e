// Licensed under the Apache-2.0 license

//! Static per-port instance registry.
//!
//! One engine instance exists per physical bus or port, allocated at
//! process start and never freed. The registry is a fixed-size table
//! indexed by port identifier; the set of ports is decided at build time
//! when the application declares the static. Access goes through a
//! critical section so lookups are safe from any context, including
//! against a handler touching the same slot.
//!
//! ```ignore
//! static UARTS: PortRegistry<UartController<Board0, BoardDelay>, 2> =
//!     PortRegistry::new();
//!
//! UARTS.register(0, UartController::new(hw, delay)).ok();
//! UARTS.with(0, |port| {
//!     if !port.is_open() {
//!         port.open(&Config::default());
//!     }
//!     port.send_str("boot\r\n", true)
//! });
//! ```

use core::cell::RefCell;
use critical_section::Mutex;

pub struct PortRegistry<T, const N: usize> {
    slots: [Mutex<RefCell<Option<T>>>; N],
}

impl<T, const N: usize> Default for PortRegistry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> PortRegistry<T, N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { Mutex::new(RefCell::new(None)) }; N],
        }
    }

    /// Number of slots fixed at build time.
    #[must_use]
    pub const fn capacity() -> usize {
        N
    }

    /// Populate slot `id`, typically once at startup.
    ///
    /// # Errors
    ///
    /// Hands the instance back when `id` is out of range or the slot is
    /// already populated; instances are singletons and never replaced.
    pub fn register(&self, id: usize, instance: T) -> Result<(), T> {
        critical_section::with(|cs| {
            let Some(slot) = self.slots.get(id) else {
                return Err(instance);
            };
            let mut slot = slot.borrow_ref_mut(cs);
            if slot.is_some() {
                return Err(instance);
            }
            *slot = Some(instance);
            Ok(())
        })
    }

    /// Run `f` against the instance in slot `id`. Returns `None` when the
    /// slot is out of range or unpopulated.
    pub fn with<R>(&self, id: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let slot = self.slots.get(id)?;
            let mut slot = slot.borrow_ref_mut(cs);
            slot.as_mut().map(f)
        })
    }

    #[must_use]
    pub fn is_registered(&self, id: usize) -> bool {
        critical_section::with(|cs| {
            self.slots
                .get(id)
                .is_some_and(|slot| slot.borrow_ref(cs).is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_access() {
        let registry: PortRegistry<u32, 3> = PortRegistry::new();
        assert!(!registry.is_registered(1));
        assert!(registry.register(1, 42).is_ok());
        assert!(registry.is_registered(1));

        let doubled = registry.with(1, |value| {
            *value *= 2;
            *value
        });
        assert_eq!(doubled, Some(84));
        assert_eq!(registry.with(1, |value| *value), Some(84));
    }

    #[test]
    fn double_register_hands_instance_back() {
        let registry: PortRegistry<&str, 2> = PortRegistry::new();
        assert!(registry.register(0, "first").is_ok());
        assert_eq!(registry.register(0, "second"), Err("second"));
        assert_eq!(registry.with(0, |value| *value), Some("first"));
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        let registry: PortRegistry<u8, 2> = PortRegistry::new();
        assert_eq!(registry.register(5, 9), Err(9));
        assert_eq!(registry.with(5, |value| *value), None);
        assert!(!registry.is_registered(5));
    }

    #[test]
    fn empty_slot_yields_none() {
        let registry: PortRegistry<u8, 2> = PortRegistry::new();
        assert_eq!(registry.with(0, |value| *value), None);
    }
}
