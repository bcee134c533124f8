//! Voice pool: an arena of generational handles with expiry sweeping.
//!
//! Every voice is inserted with its stop frame; a min-heap of those frames
//! lets `sweep` release expired voices in O(log n) each without a cleanup
//! callback per voice. Capacity is fixed up front, so inserting never
//! allocates past warm-up and a flood of notes can never grow the pool.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::voice::{Voice, VoiceOutput};

/// Handle to a pooled voice. Stale handles (released slots) never alias a
/// newer voice thanks to the generation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    voice: Option<Voice>,
}

#[derive(Debug)]
pub struct VoicePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// (stop_frame, index, generation), earliest first.
    expiries: BinaryHeap<Reverse<(u64, u32, u32)>>,
    live: usize,
    capacity: usize,
}

impl VoicePool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        VoicePool {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            expiries: BinaryHeap::with_capacity(capacity),
            live: 0,
            capacity,
        }
    }

    /// Insert a voice. Returns `None` (dropping the voice) when full.
    pub fn insert(&mut self, voice: Voice) -> Option<VoiceId> {
        if self.live >= self.capacity {
            return None;
        }
        let stop = voice.stop_frame;
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(Slot { generation: 0, voice: None });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.voice = Some(voice);
        self.live += 1;
        let id = VoiceId { index, generation: slot.generation };
        self.expiries.push(Reverse((stop, index, slot.generation)));
        Some(id)
    }

    /// Release every voice whose stop frame is at or before `frame`.
    pub fn sweep(&mut self, frame: u64) -> usize {
        let mut released = 0;
        while let Some(Reverse((stop, index, generation))) = self.expiries.peek().copied() {
            if stop > frame {
                break;
            }
            self.expiries.pop();
            if self.release(VoiceId { index, generation }) {
                released += 1;
            }
        }
        released
    }

    /// Release one voice early. False if the handle is stale.
    pub fn release(&mut self, id: VoiceId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.voice.is_none() {
            return false;
        }
        slot.voice = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    /// Release everything at once (teardown).
    pub fn clear(&mut self) -> usize {
        let released = self.live;
        self.slots.clear();
        self.free.clear();
        self.expiries.clear();
        self.live = 0;
        released
    }

    /// Sum every live voice at `frame`.
    pub fn render(&mut self, frame: u64) -> VoiceOutput {
        let mut mix = VoiceOutput::default();
        for voice in self.slots.iter_mut().filter_map(|s| s.voice.as_mut()) {
            let out = voice.render(frame);
            mix.dry += out.dry;
            mix.send += out.send;
            mix.cabin += out.cabin;
        }
        mix
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.voice.as_ref())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frame of the next pending expiry, if any.
    pub fn next_expiry(&self) -> Option<u64> {
        self.expiries.peek().map(|Reverse((stop, _, _))| *stop)
    }
}
