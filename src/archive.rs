//! Binary game archive.
//!
//! ```text
//! header  'G' size:u8
//! game    'g' len:i32 result:i8 count:u16 move*count
//!         (len counts the bytes after the length field)
//! move    val:u16
//!           bits 0..9   real position, N*N = pass
//!           0x8000      captures follow: n:u16 pos:u16*n
//!           0x4000      N*N+1 f32 probabilities follow
//!           0x2000      move marked invalid by its producer
//! ```
//!
//! Everything is little endian. The writer replays each game on a
//! [`Board`] and drops games with illegal moves; the reader checks the
//! stones and captures of each game on a plain color array.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::board::{Board, BoardContext};
use crate::constants::{MAX_BOARD_SIZE, PASS, Vertex};
use crate::error::{Error, Result};

pub const ARCHIVE_MAGIC: u8 = b'G';
pub const GAME_MAGIC: u8 = b'g';

const POS_MASK: u16 = 0x01ff;
const HAS_REMOVALS: u16 = 0x8000;
const HAS_PROBS: u16 = 0x4000;
const MARKED_INVALID: u16 = 0x2000;

/// Bytes between the game signature and the first move.
const GAME_HEADER_LEN: usize = 1 + 4 + 1 + 2;

/// One decoded move.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMove {
    /// Real position, `N*N` for a pass.
    pub pos: usize,
    /// Real positions of the stones this move captured.
    pub removed: Vec<usize>,
    pub probs: Option<Vec<f32>>,
    pub valid: bool,
}

/// One decoded game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    /// +1 black won, -1 white won, 0 unknown.
    pub result: i8,
    pub moves: Vec<ArchiveMove>,
}

impl GameRecord {
    /// Moves as board vertices, passes included.
    pub fn vertices(&self, ctx: &BoardContext) -> Vec<Vertex> {
        let g = &ctx.geom;
        self.moves
            .iter()
            .map(|m| g.from_real(m.pos).unwrap_or(PASS))
            .collect()
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Archive writer for one board size.
pub struct ArchiveWriter<W: Write> {
    out: W,
    board: Board,
    buffer: Vec<u8>,
    move_count: u16,
    game_valid: bool,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create (truncate) the archive file at `path`.
    pub fn create(path: impl AsRef<Path>, ctx: Arc<BoardContext>) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), ctx)
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Write the archive header to `out`.
    pub fn new(mut out: W, ctx: Arc<BoardContext>) -> Result<Self> {
        let size = ctx.geom.size;
        out.write_all(&[ARCHIVE_MAGIC, size as u8])?;
        Ok(Self {
            out,
            board: Board::with_seed(ctx, 0),
            buffer: Vec::new(),
            move_count: 0,
            game_valid: false,
        })
    }

    pub fn start_game(&mut self) {
        self.board.clear();
        self.buffer.clear();
        self.buffer.push(GAME_MAGIC);
        // length, result and count are filled in by end_game
        self.buffer.extend_from_slice(&[0; GAME_HEADER_LEN - 1]);
        self.move_count = 0;
        self.game_valid = true;
    }

    /// Append a move of the side to move. `probs` is either empty or holds
    /// `N*N+1` values.
    ///
    /// An illegal move invalidates the rest of the game.
    pub fn add_move(&mut self, v: Vertex, probs: &[f32], valid: bool) {
        if !self.game_valid {
            return;
        }
        let g = self.board.geometry();
        let on_board = v == PASS || (v < g.ebvcnt && g.is_real(v));
        if !on_board || !self.board.is_legal(self.board.turn(), v) {
            self.game_valid = false;
            return;
        }
        debug_assert!(probs.is_empty() || probs.len() == g.bvcnt + 1);

        let pos = g.to_real(v) as u16;
        self.board.play_legal(v);

        let g = self.board.geometry();
        let removed: Vec<u16> = self
            .board
            .removed_stones()
            .iter()
            .map(|&s| g.to_real(s) as u16)
            .collect();

        let mut val = pos;
        if !removed.is_empty() {
            val |= HAS_REMOVALS;
        }
        if !probs.is_empty() {
            val |= HAS_PROBS;
        }
        if !valid {
            val |= MARKED_INVALID;
        }

        self.buffer.extend_from_slice(&val.to_le_bytes());
        if !removed.is_empty() {
            self.buffer
                .extend_from_slice(&(removed.len() as u16).to_le_bytes());
            for r in removed {
                self.buffer.extend_from_slice(&r.to_le_bytes());
            }
        }
        for p in probs {
            self.buffer.extend_from_slice(&p.to_le_bytes());
        }
        self.move_count += 1;
    }

    /// Write the current game. Returns the bytes written, 0 if the game was
    /// discarded.
    pub fn end_game(&mut self, result: i8) -> Result<usize> {
        if self.buffer.is_empty() {
            return Err(Error::GameNotStarted);
        }
        if !self.game_valid {
            warn!("game discarded (invalid moves)");
            self.buffer.clear();
            self.game_valid = false;
            return Ok(0);
        }

        let len = (self.buffer.len() - 5) as i32;
        self.buffer[1..5].copy_from_slice(&len.to_le_bytes());
        self.buffer[5] = result as u8;
        self.buffer[6..8].copy_from_slice(&self.move_count.to_le_bytes());
        self.out.write_all(&self.buffer)?;

        let written = self.buffer.len();
        self.buffer.clear();
        self.game_valid = false;
        Ok(written)
    }

    /// Write a whole game of plain moves.
    pub fn encode_game(&mut self, moves: &[Vertex], result: i8) -> Result<usize> {
        self.start_game();
        for &v in moves {
            self.add_move(v, &[], true);
        }
        self.end_game(result)
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Iterator over the games of an archive.
///
/// A game with bad content yields an `Err` and reading goes on with the
/// next game. A truncated or unreadable stream yields one `Err` and ends
/// the iteration.
pub struct ArchiveReader<R: Read> {
    input: R,
    size: usize,
    done: bool,
}

impl ArchiveReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Read the header from `input`.
    pub fn new(mut input: R) -> Result<Self> {
        let mut header = [0u8; 2];
        read_exact_or(&mut input, &mut header, "header")?;
        if header[0] != ARCHIVE_MAGIC {
            return Err(Error::BadSignature);
        }
        let size = header[1] as usize;
        if !(2..=MAX_BOARD_SIZE).contains(&size) {
            return Err(Error::UnsupportedBoardSize(size));
        }
        info!("archive board size {size}");
        Ok(Self {
            input,
            size,
            done: false,
        })
    }

    pub fn board_size(&self) -> usize {
        self.size
    }

    /// Fail unless the archive was written for `expected`.
    pub fn expect_size(self, expected: usize) -> Result<Self> {
        if self.size != expected {
            return Err(Error::BoardSizeMismatch {
                expected,
                found: self.size,
            });
        }
        Ok(self)
    }

    fn read_game(&mut self) -> Option<Result<Vec<u8>>> {
        let mut sig = [0u8; 1];
        match self.input.read(&mut sig) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => return Some(Err(e.into())),
        }
        if sig[0] != GAME_MAGIC {
            return Some(Err(Error::BadGameSignature(sig[0])));
        }
        let mut len = [0u8; 4];
        if let Err(e) = read_exact_or(&mut self.input, &mut len, "game length") {
            return Some(Err(e));
        }
        let len = i32::from_le_bytes(len);
        if len < 3 {
            return Some(Err(Error::Truncated("game length")));
        }
        let mut body = vec![0u8; len as usize];
        if let Err(e) = read_exact_or(&mut self.input, &mut body, "game body") {
            return Some(Err(e));
        }
        Some(Ok(body))
    }
}

impl<R: Read> Iterator for ArchiveReader<R> {
    type Item = Result<GameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_game() {
            None => {
                self.done = true;
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Some(Ok(body)) => Some(decode_game(&body, self.size)),
        }
    }
}

fn read_exact_or(input: &mut impl Read, buf: &mut [u8], what: &'static str) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Truncated(what),
        _ => Error::Io(e),
    })
}

/// Little-endian cursor over one game body.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let bytes = self.buf.get(self.pos..end).ok_or(Error::Truncated(what))?;
        self.pos = end;
        Ok(bytes)
    }

    fn u16(&mut self, what: &'static str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn f32(&mut self, what: &'static str) -> Result<f32> {
        let b = self.take(4, what)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode one game body and replay it on a color array.
fn decode_game(body: &[u8], size: usize) -> Result<GameRecord> {
    let bvcnt = size * size;
    let mut cur = Cursor { buf: body, pos: 0 };

    let result = cur.take(1, "result")?[0] as i8;
    if !(-1..=1).contains(&result) {
        return Err(Error::BadResult(result));
    }
    let steps = cur.u16("move count")?;

    // 1 black, -1 white
    let mut stones = vec![0i8; bvcnt];
    let mut player = 1i8;
    let mut moves = Vec::with_capacity(steps as usize);

    for _ in 0..steps {
        let val = cur.u16("move")?;
        let pos = val & POS_MASK;
        if pos as usize > bvcnt {
            return Err(Error::InvalidPosition(pos));
        }
        if (pos as usize) < bvcnt {
            if stones[pos as usize] != 0 {
                return Err(Error::Occupied(pos));
            }
            stones[pos as usize] = player;
        }

        let mut removed = Vec::new();
        if val & HAS_REMOVALS != 0 {
            let count = cur.u16("removal count")?;
            for _ in 0..count {
                let r = cur.u16("removal")?;
                if r as usize >= bvcnt {
                    return Err(Error::InvalidPosition(r));
                }
                if stones[r as usize] != -player {
                    return Err(Error::UnexpectedRemoval(r));
                }
                stones[r as usize] = 0;
                removed.push(r as usize);
            }
        }

        let probs = if val & HAS_PROBS != 0 {
            let p = (0..=bvcnt)
                .map(|_| cur.f32("probabilities"))
                .collect::<Result<Vec<f32>>>()?;
            Some(p)
        } else {
            None
        };

        moves.push(ArchiveMove {
            pos: pos as usize,
            removed,
            probs,
            valid: val & MARKED_INVALID == 0,
        });
        player = -player;
    }

    Ok(GameRecord { result, moves })
}

/// Check every game of the archive at `path`; returns the total number of
/// moves.
pub fn verify(path: impl AsRef<Path>) -> Result<usize> {
    let reader = ArchiveReader::open(path)?;
    let mut total = 0;
    for game in reader {
        total += game?.moves.len();
    }
    Ok(total)
}
