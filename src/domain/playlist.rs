/// Endless background playlist with no immediate repeats.
///
/// The buffer grows in blocks: each `extend()` appends one shuffled
/// permutation of all songs. A new block whose first song equals the last
/// song of the buffer is reshuffled, up to `MAX_RESHUFFLES` times. The cursor
/// walks the buffer; a lookahead of `remember` songs is kept so stepping
/// back always has history to return to.

use crate::domain::model::Song;

pub const DEFAULT_REMEMBER: usize = 5;

const MAX_RESHUFFLES: u32 = 10;

/// What the now-playing panel shows for a playlist.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SongView<'a> {
    /// Theme without songs.
    Empty,
    /// The only song of the theme, looping.
    Single(&'a Song),
    /// Nothing played yet; the blank slot precedes the next song.
    NotStarted { next: &'a Song },
    /// First song of the buffer is playing.
    First { current: &'a Song, next: &'a Song },
    Playing { previous: &'a Song, current: &'a Song, next: &'a Song },
}

#[derive(Debug)]
pub struct Playlist {
    songs: Vec<Song>,
    buffer: Vec<usize>,
    /// `None` until the first song is taken.
    cursor: Option<usize>,
    remember: usize,
    rng: fastrand::Rng,
}

impl Playlist {
    #[cfg(test)]
    pub fn new(songs: &[Song], remember: usize) -> Self {
        Self::with_rng(songs, remember, fastrand::Rng::new())
    }

    pub fn with_rng(songs: &[Song], remember: usize, rng: fastrand::Rng) -> Self {
        let remember = if songs.is_empty() { 0 } else { remember.max(1) };
        let mut pl = Playlist {
            songs: songs.to_vec(),
            buffer: Vec::new(),
            cursor: None,
            remember,
            rng,
        };
        while pl.buffer.len() < pl.remember {
            pl.extend();
        }
        pl
    }

    #[cfg(test)]
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn is_single(&self) -> bool {
        self.songs.len() == 1
    }

    #[cfg(test)]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Songs generated so far, in play order.
    #[cfg(test)]
    pub fn history(&self) -> impl Iterator<Item = &Song> + '_ {
        self.buffer.iter().map(|&i| &self.songs[i])
    }

    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append one rotation block.
    pub fn extend(&mut self) {
        match self.songs.len() {
            0 => {}
            1 => self.buffer.push(0),
            n => {
                let mut block: Vec<usize> = (0..n).collect();
                self.rng.shuffle(&mut block);
                if let Some(&last) = self.buffer.last() {
                    let mut tries = 0;
                    while block[0] == last && tries < MAX_RESHUFFLES {
                        self.rng.shuffle(&mut block);
                        tries += 1;
                    }
                }
                self.buffer.extend(block);
            }
        }
    }

    pub fn next_song(&mut self) -> Option<&Song> {
        if self.buffer.is_empty() {
            return None;
        }
        // keep `remember` songs queued past the one about to play
        let next = self.cursor.map_or(0, |c| c + 1);
        if next + self.remember >= self.buffer.len() {
            self.extend();
        }
        self.cursor = Some(next);
        Some(&self.songs[self.buffer[next]])
    }

    /// Step back one song. At the start of the buffer the cursor falls back
    /// to "not started" and nothing is returned, however often this is called.
    pub fn previous_song(&mut self) -> Option<&Song> {
        if self.buffer.is_empty() {
            return None;
        }
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                Some(&self.songs[self.buffer[c - 1]])
            }
            _ => {
                self.cursor = None;
                None
            }
        }
    }

    pub fn songs_for_viewing(&self) -> SongView<'_> {
        if self.buffer.is_empty() {
            return SongView::Empty;
        }
        if self.songs.len() == 1 {
            return SongView::Single(&self.songs[0]);
        }
        let at = |i: usize| &self.songs[self.buffer[i]];
        match self.cursor {
            None => SongView::NotStarted { next: at(0) },
            Some(0) => SongView::First { current: at(0), next: at(1) },
            Some(c) => SongView::Playing { previous: at(c - 1), current: at(c), next: at(c + 1) },
        }
    }
}
