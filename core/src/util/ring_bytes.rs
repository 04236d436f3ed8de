use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Capped byte buffer that keeps the tail of whatever is pushed into it.
///
/// Used to bound command-output capture: a child that prints gigabytes only
/// ever costs `cap` bytes of memory, and the caller still sees the most
/// recent output.
#[derive(Clone)]
pub struct RingBytes {
    inner: Arc<Mutex<VecDeque<u8>>>,
    cap: usize,
}

impl RingBytes {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(cap.min(16 * 1024)))),
            cap,
        })
    }

    pub fn push(&self, data: &[u8]) {
        let mut g = self.inner.lock().unwrap();
        let data = if data.len() > self.cap {
            &data[data.len() - self.cap..]
        } else {
            data
        };
        let overflow = g.len().saturating_add(data.len()).saturating_sub(self.cap);
        if overflow > 0 {
            g.drain(..overflow);
        }
        g.extend(data);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let g = self.inner.lock().unwrap();
        let mut vec = Vec::with_capacity(g.len());
        vec.extend(g.iter().copied());
        vec
    }

    /// Captured tail as a lossily-decoded string.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}
