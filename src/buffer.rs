// Copyright 2022 Ryan Seipp
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Growable, contiguous byte buffer used for per-connection read/write staging.

use std::{
    alloc::{self, Layout},
    borrow::{Borrow, BorrowMut},
    io::Write,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::{copy, copy_nonoverlapping, NonNull},
};

/// A growable, contiguous byte buffer.
#[derive(Debug)]
pub struct Buffer {
    ptr: NonNull<u8>,
    cap: usize,
    read_offset: usize,
    write_offset: usize,
    desired_capacity: usize,
    _marker: PhantomData<u8>,
}

// Safety: `Buffer` owns its allocation outright and contains no interior mutability or
// thread-local state; moving the heap pointer between threads is safe.
unsafe impl Send for Buffer {}

impl Buffer {
    /// Creates a new `Buffer`. If `desired_capacity` is non-zero, the backing allocation is
    /// made eagerly; otherwise the first write grows it.
    pub fn new(desired_capacity: usize) -> Self {
        let mut result = Self {
            ptr: NonNull::dangling(),
            cap: 0, // `grow_to_capacity` will set this
            read_offset: 0,
            write_offset: 0,
            desired_capacity: desired_capacity.next_power_of_two(),
            _marker: PhantomData,
        };

        if desired_capacity > 0 {
            result.desired_capacity = 2;
            result.grow();
        }
        result
    }

    /// Reserves at least `capacity` additional bytes.
    pub fn reserve(&mut self, capacity: usize) {
        self.grow_to_capacity(self.cap + capacity);
    }

    /// Bytes available to be read.
    pub fn remaining(&self) -> usize {
        self.write_offset - self.read_offset
    }

    /// Capacity available for writing.
    pub fn remaining_mut(&self) -> usize {
        self.cap - self.write_offset
    }

    /// The current write position.
    pub fn write_pos(&self) -> usize {
        self.write_offset
    }

    /// Pointer to the current read position. Use `remaining` for the valid length.
    fn read_ptr(&self) -> *mut u8 {
        // Safety: both `ptr` and the resulting pointer stay within the allocated object; offsets
        // are bounded by `cap`, which never exceeds `isize::MAX`.
        unsafe { self.ptr.as_ptr().add(self.read_offset) }
    }

    /// Pointer to the current write position. Use `remaining_mut` for the valid length.
    fn write_ptr(&self) -> *mut u8 {
        // Safety: see `read_ptr`.
        unsafe { self.ptr.as_ptr().add(self.write_offset) }
    }

    /// Marks `amount` bytes as read, freeing them for reuse.
    pub fn mark_read(&mut self, amount: usize) {
        self.read_offset = self.write_offset.min(self.read_offset + amount);
        self.compact();
    }

    /// Marks `amount` bytes as written. The next write will overwrite unmarked data.
    pub fn mark_written(&mut self, amount: usize) {
        self.write_offset = self.cap.min(self.write_offset + amount);
    }

    /// Doubles capacity, or allocates `desired_capacity` on first use.
    fn grow(&mut self) {
        let new_cap = if self.cap == 0 {
            self.desired_capacity
        } else {
            2 * self.cap
        };

        self.grow_to_capacity(new_cap);
    }

    /// Grows to at least `capacity`, rounded up to the next power of two.
    ///
    /// Aborts the process on allocation failure.
    fn grow_to_capacity(&mut self, capacity: usize) {
        assert!(capacity <= isize::MAX as usize);

        let new_cap = capacity.next_power_of_two().min(isize::MAX as usize);

        let new_layout = Layout::array::<u8>(new_cap).unwrap();
        let new_ptr = if self.cap == 0 {
            // Safety: layout is non-zero-sized; allocation failure is handled below.
            unsafe { alloc::alloc(new_layout) }
        } else {
            let old_layout = Layout::array::<u8>(self.cap).unwrap();
            let old_ptr = self.ptr.as_ptr();

            // Safety: `old_ptr` was allocated with `old_layout`; failure handled below.
            unsafe { alloc::realloc(old_ptr, old_layout, new_layout.size()) }
        };

        self.ptr = match NonNull::new(new_ptr) {
            Some(p) => p,
            None => alloc::handle_alloc_error(new_layout),
        };
        self.cap = new_cap;
    }

    /// Resets to an empty buffer, releasing capacity beyond `desired_capacity`.
    fn clear(&mut self) {
        self.read_offset = 0;
        self.write_offset = 0;

        if self.cap > self.desired_capacity {
            let layout = Layout::array::<u8>(self.cap).unwrap();

            // Safety: `self.ptr` was allocated with `layout`; failure handled below.
            let new_ptr = unsafe { alloc::realloc(self.ptr.as_ptr(), layout, self.desired_capacity) };

            self.ptr = match NonNull::new(new_ptr) {
                Some(p) => p,
                None => alloc::handle_alloc_error(layout),
            };
            self.cap = self.desired_capacity;
        }
    }

    /// Slides unread bytes to the front of the allocation when there's slack to reclaim.
    fn compact(&mut self) {
        if self.remaining() == 0 {
            self.clear();
            return;
        }

        if self.cap == self.desired_capacity {
            return;
        }

        if self.read_offset > self.desired_capacity {
            if self.remaining() < self.read_offset {
                // Safety: source and destination ranges don't overlap because the unread region
                // is smaller than the gap being closed.
                unsafe { copy_nonoverlapping(self.read_ptr(), self.ptr.as_ptr(), self.remaining()) }
            } else {
                // Safety: `read_ptr` and `ptr` are both valid for `remaining()` bytes.
                unsafe { copy(self.read_ptr(), self.ptr.as_ptr(), self.remaining()) }
            }

            self.write_offset = self.remaining();
            self.read_offset = 0;
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.cap != 0 {
            let layout = Layout::array::<u8>(self.cap).unwrap();
            // Safety: `u8` needs no drop glue; the allocation was made with `layout`.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) }
        }
    }
}

impl Borrow<[u8]> for Buffer {
    fn borrow(&self) -> &[u8] {
        // Safety: points into a single live allocation, initialized for `remaining()` bytes.
        unsafe { std::slice::from_raw_parts(self.read_ptr(), self.remaining()) }
    }
}

impl BorrowMut<[u8]> for Buffer {
    fn borrow_mut(&mut self) -> &mut [u8] {
        // Safety: points into a single live allocation, valid for `remaining_mut()` bytes.
        unsafe { std::slice::from_raw_parts_mut(self.write_ptr(), self.remaining_mut()) }
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.borrow_mut()
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.remaining_mut() < buf.len() {
            self.reserve(buf.len());
        }
        self.deref_mut()[0..buf.len()].clone_from_slice(buf);
        self.mark_written(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty() {
        let buf = Buffer::new(16);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = Buffer::new(16);
        buf.write_all(b"hello").unwrap();
        assert_eq!(buf.remaining(), 5);
        assert_eq!(&buf[..], b"hello");
        buf.mark_read(5);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut buf = Buffer::new(4);
        let data = vec![7u8; 1000];
        buf.write_all(&data).unwrap();
        assert_eq!(buf.remaining(), 1000);
        assert_eq!(&buf[..], data.as_slice());
    }

    #[test]
    fn compacts_after_full_read() {
        let mut buf = Buffer::new(16);
        buf.write_all(b"abcdefgh").unwrap();
        buf.mark_read(8);
        buf.write_all(b"ijkl").unwrap();
        assert_eq!(&buf[..], b"ijkl");
    }
}
