use std::{collections::VecDeque, marker::PhantomData, time::Duration};

use crate::backends::Instant;

/// Generates sequential keys of a wrapping u16-backed type, recycling
/// released keys after a timeout so a key is never handed out again while a
/// holder could still reference it.
pub struct KeyGenerator<K: From<u16> + Into<u16> + Copy> {
    recycle_timeout: Duration,
    recycled_keys: VecDeque<(u16, Instant)>,
    next_key: u16,
    phantom: PhantomData<K>,
}

impl<K: From<u16> + Into<u16> + Copy> KeyGenerator<K> {
    pub fn new(recycle_timeout: Duration) -> Self {
        Self {
            recycle_timeout,
            recycled_keys: VecDeque::new(),
            next_key: 0,
            phantom: PhantomData,
        }
    }

    /// Get a new, unused key
    pub fn generate(&mut self) -> K {
        if let Some((value, released_at)) = self.recycled_keys.front() {
            if released_at.elapsed() >= self.recycle_timeout {
                let value = *value;
                self.recycled_keys.pop_front();
                return K::from(value);
            }
        }

        let value = self.next_key;
        self.next_key = self.next_key.wrapping_add(1);
        K::from(value)
    }

    /// Recycle a used key, making it available for generation once the
    /// recycle timeout has elapsed
    pub fn recycle_key(&mut self, key: &K) {
        self.recycled_keys
            .push_back(((*key).into(), Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct TestKey(u16);

    impl From<u16> for TestKey {
        fn from(value: u16) -> Self {
            TestKey(value)
        }
    }

    impl From<TestKey> for u16 {
        fn from(value: TestKey) -> Self {
            value.0
        }
    }

    #[test]
    fn generates_sequential_keys() {
        let mut generator = KeyGenerator::<TestKey>::new(Duration::from_secs(1));

        assert_eq!(generator.generate().0, 0);
        assert_eq!(generator.generate().0, 1);
        assert_eq!(generator.generate().0, 2);
    }

    #[test]
    fn does_not_recycle_before_timeout() {
        let mut generator = KeyGenerator::<TestKey>::new(Duration::from_secs(10));

        let key = generator.generate();
        generator.recycle_key(&key);

        assert_eq!(generator.generate().0, 1);
        assert_eq!(generator.generate().0, 2);
    }

    #[test]
    fn recycles_in_fifo_order_after_timeout() {
        let mut generator = KeyGenerator::<TestKey>::new(Duration::from_millis(10));

        let key1 = generator.generate();
        let key2 = generator.generate();
        generator.recycle_key(&key1);
        generator.recycle_key(&key2);

        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(generator.generate().0, 0);
        assert_eq!(generator.generate().0, 1);
    }
}
