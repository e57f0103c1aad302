// SPDX-License-Identifier: CEPL-1.0
//! Scripted stand-ins for the GPU and the window (no device required).
//!
//! `MockBackend` models the GPU as an in-order queue: a submission retires
//! (signalling its fence) only when the CPU blocks on a fence or drains the
//! device, which is the earliest point the frame loop could observe it.

use std::collections::VecDeque;

use anyhow::{anyhow, bail, Result};

use crate::{Acquire, FrameBackend, Present, RenderSize, Submission, WindowSurface};

pub type Semaphore = u32;
pub type Fence = u32;

const MOCK_FORMAT: u32 = 50; // VK_FORMAT_B8G8R8A8_SRGB

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Acquire { semaphore: Semaphore },
    FenceWait { fence: Fence, blocked: bool },
    FenceReset { fence: Fence },
    Submit { image: u32, wait: Semaphore, signal: Semaphore, fence: Fence },
    Retired { image: u32, fence: Fence },
    Present { image: u32, wait: Semaphore },
    WaitIdle,
    Rebuild { size: RenderSize },
}

enum AcquireStep {
    Index(u32, bool),
    OutOfDate,
    Fail(&'static str),
}

enum PresentStep {
    Done(Present),
    Fail(&'static str),
}

pub struct MockBackend {
    image_count: usize,
    next_image_count: Option<usize>,
    acquired: u32,
    acquire_script: VecDeque<AcquireStep>,
    present_script: VecDeque<PresentStep>,

    // Indexed by handle; `None` once destroyed.
    fences: Vec<Option<bool>>,
    semaphores: Vec<bool>,

    queue: VecDeque<(u32, Fence)>,
    busy_slots: Vec<bool>,
    violations: usize,

    builds: Vec<RenderSize>,
    idle_waits: usize,
    events: Vec<Event>,
}

impl MockBackend {
    pub fn new(image_count: usize) -> Self {
        Self {
            image_count,
            next_image_count: None,
            acquired: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fences: Vec::new(),
            semaphores: Vec::new(),
            queue: VecDeque::new(),
            busy_slots: vec![false; image_count],
            violations: 0,
            builds: Vec::new(),
            idle_waits: 0,
            events: Vec::new(),
        }
    }

    pub fn script_acquire(&mut self, indices: impl IntoIterator<Item = u32>) {
        self.acquire_script
            .extend(indices.into_iter().map(|i| AcquireStep::Index(i, false)));
    }

    pub fn script_acquire_suboptimal(&mut self, index: u32) {
        self.acquire_script
            .push_back(AcquireStep::Index(index, true));
    }

    pub fn script_acquire_out_of_date(&mut self) {
        self.acquire_script.push_back(AcquireStep::OutOfDate);
    }

    pub fn fail_next_acquire(&mut self, code: &'static str) {
        self.acquire_script.push_back(AcquireStep::Fail(code));
    }

    pub fn script_present(&mut self, outcomes: impl IntoIterator<Item = Present>) {
        self.present_script
            .extend(outcomes.into_iter().map(PresentStep::Done));
    }

    pub fn fail_next_present(&mut self, code: &'static str) {
        self.present_script.push_back(PresentStep::Fail(code));
    }

    /// The presentation engine returns this many images on the next rebuild.
    pub fn next_image_count(&mut self, count: usize) {
        self.next_image_count = Some(count);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn builds(&self) -> &[RenderSize] {
        &self.builds
    }

    pub fn idle_waits(&self) -> usize {
        self.idle_waits
    }

    pub fn format(&self) -> u32 {
        MOCK_FORMAT
    }

    pub fn pending_submissions(&self) -> usize {
        self.queue.len()
    }

    /// Submissions made to an image slot whose previous work had not retired.
    pub fn slot_reuse_violations(&self) -> usize {
        self.violations
    }

    pub fn is_signaled(&self, fence: Fence) -> bool {
        matches!(self.fences.get(fence as usize), Some(Some(true)))
    }

    pub fn is_live_fence(&self, fence: Fence) -> bool {
        matches!(self.fences.get(fence as usize), Some(Some(_)))
    }

    pub fn live_fences(&self) -> usize {
        self.fences.iter().filter(|f| f.is_some()).count()
    }

    pub fn live_semaphores(&self) -> usize {
        self.semaphores.iter().filter(|&&live| live).count()
    }

    fn retire_one(&mut self) -> bool {
        let Some((image, fence)) = self.queue.pop_front() else {
            return false;
        };
        if let Some(state) = self.fences.get_mut(fence as usize).and_then(Option::as_mut) {
            *state = true;
        }
        if let Some(busy) = self.busy_slots.get_mut(image as usize) {
            *busy = false;
        }
        self.events.push(Event::Retired { image, fence });
        true
    }

    fn fence_state(&self, fence: Fence) -> Result<bool> {
        self.fences
            .get(fence as usize)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("fence {fence} is not live"))
    }
}

impl FrameBackend for MockBackend {
    type Semaphore = Semaphore;
    type Fence = Fence;

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn create_semaphore(&mut self) -> Result<Semaphore> {
        self.semaphores.push(true);
        Ok(self.semaphores.len() as Semaphore - 1)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<Fence> {
        self.fences.push(Some(signaled));
        Ok(self.fences.len() as Fence - 1)
    }

    fn destroy_semaphore(&mut self, semaphore: Semaphore) {
        self.semaphores[semaphore as usize] = false;
    }

    fn destroy_fence(&mut self, fence: Fence) {
        assert!(
            !self.queue.iter().any(|&(_, f)| f == fence),
            "fence {fence} destroyed while the GPU may still signal it"
        );
        self.fences[fence as usize] = None;
    }

    fn acquire(&mut self, semaphore: Semaphore) -> Result<Acquire> {
        self.events.push(Event::Acquire { semaphore });
        match self.acquire_script.pop_front() {
            Some(AcquireStep::Index(index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
            Some(AcquireStep::OutOfDate) => Ok(Acquire::OutOfDate),
            Some(AcquireStep::Fail(code)) => bail!(code),
            None => {
                let index = self.acquired % self.image_count as u32;
                self.acquired += 1;
                Ok(Acquire::Image {
                    index,
                    suboptimal: false,
                })
            }
        }
    }

    fn wait_fence(&mut self, fence: Fence) -> Result<()> {
        let mut blocked = false;
        while !self.fence_state(fence)? {
            blocked = true;
            if !self.retire_one() {
                bail!("waiting on fence {fence} that nothing will signal");
            }
        }
        self.events.push(Event::FenceWait { fence, blocked });
        Ok(())
    }

    fn reset_fence(&mut self, fence: Fence) -> Result<()> {
        self.fence_state(fence)?;
        self.fences[fence as usize] = Some(false);
        self.events.push(Event::FenceReset { fence });
        Ok(())
    }

    fn submit(&mut self, image: u32, sync: Submission<Semaphore, Fence>) -> Result<()> {
        if self.fence_state(sync.fence)? {
            bail!("submitting with fence {} still signalled", sync.fence);
        }
        let slot = self
            .busy_slots
            .get_mut(image as usize)
            .ok_or_else(|| anyhow!("image {image} out of range"))?;
        if *slot {
            self.violations += 1;
        }
        *slot = true;
        self.queue.push_back((image, sync.fence));
        self.events.push(Event::Submit {
            image,
            wait: sync.wait,
            signal: sync.signal,
            fence: sync.fence,
        });
        Ok(())
    }

    fn present(&mut self, image: u32, wait: Semaphore) -> Result<Present> {
        self.events.push(Event::Present { image, wait });
        match self.present_script.pop_front() {
            Some(PresentStep::Done(outcome)) => Ok(outcome),
            Some(PresentStep::Fail(code)) => bail!(code),
            None => Ok(Present::Presented),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        while self.retire_one() {}
        self.idle_waits += 1;
        self.events.push(Event::WaitIdle);
        Ok(())
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<()> {
        if !self.queue.is_empty() {
            bail!("bundle rebuilt with {} submissions in flight", self.queue.len());
        }
        if let Some(count) = self.next_image_count.take() {
            self.image_count = count;
        }
        self.busy_slots = vec![false; self.image_count];
        self.builds.push(size);
        self.events.push(Event::Rebuild { size });
        Ok(())
    }
}

pub struct MockWindow {
    size: RenderSize,
    sizes_after_wait: VecDeque<RenderSize>,
    polls: usize,
    waits: usize,
    close_after_polls: Option<usize>,
    close_after_waits: Option<usize>,
}

impl MockWindow {
    pub fn new(size: RenderSize) -> Self {
        Self {
            size,
            sizes_after_wait: VecDeque::new(),
            polls: 0,
            waits: 0,
            close_after_polls: None,
            close_after_waits: None,
        }
    }

    /// Each blocking wait delivers the next size.
    pub fn sizes_after_wait(&mut self, sizes: impl IntoIterator<Item = RenderSize>) {
        self.sizes_after_wait.extend(sizes);
    }

    pub fn close_after_polls(&mut self, polls: usize) {
        self.close_after_polls = Some(polls);
    }

    pub fn close_after_waits(&mut self, waits: usize) {
        self.close_after_waits = Some(waits);
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn waits(&self) -> usize {
        self.waits
    }
}

impl WindowSurface for MockWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.size
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        if let Some(size) = self.sizes_after_wait.pop_front() {
            self.size = size;
        }
    }

    fn should_close(&self) -> bool {
        self.close_after_polls.is_some_and(|n| self.polls >= n)
            || self.close_after_waits.is_some_and(|n| self.waits >= n)
    }
}
