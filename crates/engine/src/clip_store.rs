//! Clip inventory: an arena of takes addressed by generational handles, and
//! per-clip ordered handle lists.
//!
//! Every container is sized up front from [`EngineConfig`](crate::EngineConfig),
//! so inserting and removing on the audio thread never reallocates. A clip
//! whose last take is removed gives its handle list back to a spare pool and
//! stops counting against the clip limit. Takes
//! arrive wrapped in [`Owned`], which means a removed take is handed back to
//! the caller and its memory is reclaimed by the control side's collector.

use std::collections::HashMap;

use basedrop::Owned;

use crate::error::EngineError;
use crate::take::{ClipKey, Take, TakeToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    take: Option<Owned<Take>>,
}

/// A take that could not be stored, returned with the reason.
pub struct Rejected {
    pub reason: EngineError,
    pub take: Owned<Take>,
}

pub struct ClipStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    clips: HashMap<ClipKey, Vec<TakeHandle>>,
    spare: Vec<Vec<TakeHandle>>,
    max_clips: usize,
    max_takes: usize,
    max_takes_per_clip: usize,
}

impl ClipStore {
    pub fn with_capacity(max_clips: usize, max_takes: usize, max_takes_per_clip: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_takes),
            free: Vec::with_capacity(max_takes),
            clips: HashMap::with_capacity(max_clips),
            spare: (0..max_clips)
                .map(|_| Vec::with_capacity(max_takes_per_clip))
                .collect(),
            max_clips,
            max_takes,
            max_takes_per_clip,
        }
    }

    /// Append a take to the end of a clip, creating the clip if needed.
    pub fn insert(&mut self, clip: ClipKey, take: Owned<Take>) -> Result<TakeHandle, Rejected> {
        let clip_takes = match self.clips.get(&clip) {
            Some(takes) => takes.len(),
            None if self.clips.len() >= self.max_clips => {
                return Err(Rejected {
                    reason: EngineError::ClipCapacity {
                        max: self.max_clips,
                    },
                    take,
                });
            }
            None => 0,
        };
        if clip_takes >= self.max_takes_per_clip {
            return Err(Rejected {
                reason: EngineError::ClipFull {
                    max: self.max_takes_per_clip,
                },
                take,
            });
        }

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.take = Some(take);
                TakeHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None if self.slots.len() < self.max_takes => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    take: Some(take),
                });
                TakeHandle {
                    index,
                    generation: 0,
                }
            }
            None => {
                return Err(Rejected {
                    reason: EngineError::TakeCapacity {
                        max: self.max_takes,
                    },
                    take,
                });
            }
        };

        let max_takes_per_clip = self.max_takes_per_clip;
        let spare = &mut self.spare;
        self.clips
            .entry(clip)
            .or_insert_with(|| {
                spare
                    .pop()
                    .unwrap_or_else(|| Vec::with_capacity(max_takes_per_clip))
            })
            .push(handle);
        Ok(handle)
    }

    /// Remove the first take in `clip` carrying `token`.
    ///
    /// Returns `None` (and changes nothing) if there is no such take.
    pub fn remove(&mut self, clip: ClipKey, token: TakeToken) -> Option<Owned<Take>> {
        let handles = self.clips.get_mut(&clip)?;
        let position = handles.iter().position(|handle| {
            self.slots[handle.index as usize]
                .take
                .as_ref()
                .is_some_and(|take| take.token() == token)
        })?;
        let handle = handles.remove(position);
        if handles.is_empty()
            && let Some(handles) = self.clips.remove(&clip)
        {
            self.spare.push(handles);
        }

        let slot = &mut self.slots[handle.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        slot.take.take()
    }

    pub fn get(&self, handle: TakeHandle) -> Option<&Take> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.take.as_deref())
    }

    pub fn find_mut(&mut self, clip: ClipKey, token: TakeToken) -> Option<&mut Take> {
        let handle = *self.clips.get(&clip)?.iter().find(|handle| {
            self.slots[handle.index as usize]
                .take
                .as_ref()
                .is_some_and(|take| take.token() == token)
        })?;
        self.slots[handle.index as usize].take.as_deref_mut()
    }

    /// Takes of a clip in insertion order. Empty for an unknown clip.
    pub fn takes(&self, clip: ClipKey) -> impl Iterator<Item = &Take> + '_ {
        self.clips
            .get(&clip)
            .into_iter()
            .flatten()
            .filter_map(|handle| self.get(*handle))
    }

    pub fn handles(&self, clip: ClipKey) -> &[TakeHandle] {
        self.clips.get(&clip).map_or(&[], Vec::as_slice)
    }

    pub fn contains_clip(&self, clip: ClipKey) -> bool {
        self.clips.contains_key(&clip)
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Live takes across all clips.
    pub fn take_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
