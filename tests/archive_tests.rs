//! Archive round trips through real files.

use std::path::PathBuf;
use std::sync::Arc;

use ren_go::Error;
use ren_go::archive::{ArchiveReader, ArchiveWriter, verify};
use ren_go::board::{Board, BoardContext, GameState};
use ren_go::constants::*;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ren-go-{}-{name}.bin", std::process::id()))
}

fn random_game(ctx: &Arc<BoardContext>, seed: u64) -> Board {
    let mut b = Board::with_seed(Arc::clone(ctx), seed);
    while b.state() != GameState::Ended && b.move_count() <= MAX_MOVES {
        b.select_random_move();
    }
    b
}

#[test]
fn test_round_trip_rebuilds_final_board() {
    let ctx = BoardContext::new(9).unwrap();
    let path = temp_path("round-trip");
    let games: Vec<Board> = (0..3).map(|s| random_game(&ctx, s)).collect();

    let mut w = ArchiveWriter::create(&path, Arc::clone(&ctx)).unwrap();
    for g in &games {
        assert!(w.encode_game(g.history(), 1).unwrap() > 0);
    }
    w.finish().unwrap();

    let total: usize = games.iter().map(|g| g.history().len()).sum();
    assert_eq!(verify(&path).unwrap(), total);

    let reader = ArchiveReader::open(&path).unwrap().expect_size(9).unwrap();
    for (record, played) in reader.zip(&games) {
        let record = record.unwrap();
        let moves = record.vertices(&ctx);
        assert_eq!(moves, played.history());

        let mut replay = Board::with_seed(Arc::clone(&ctx), 0);
        for &v in &moves {
            assert!(replay.is_legal(replay.turn(), v));
            replay.play_legal(v);
        }
        for &v in &ctx.geom.rtoe {
            assert_eq!(replay.color_at(v), played.color_at(v));
        }
        let captured: usize = record.moves.iter().map(|m| m.removed.len()).sum();
        let stones = replay.stone_count(WHITE) + replay.stone_count(BLACK);
        let placed = moves.iter().filter(|&&v| v != PASS).count();
        assert_eq!(placed - captured, stones);
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_verify_reports_first_error() {
    let ctx = BoardContext::new(9).unwrap();
    let path = temp_path("corrupt");
    let mut w = ArchiveWriter::create(&path, Arc::clone(&ctx)).unwrap();
    let d4 = ctx.geom.parse_coord("D4").unwrap();
    w.encode_game(&[d4, PASS], -1).unwrap();
    w.finish().unwrap();

    // Point the pass at an off-board position.
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 2;
    bytes[last..].copy_from_slice(&0x1f0u16.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(verify(&path), Err(Error::InvalidPosition(0x1f0))));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_missing_archive_is_io_error() {
    let path = temp_path("missing");
    assert!(matches!(verify(&path), Err(Error::Io(_))));
}

#[test]
fn test_verify_reads_board_size_from_header() {
    let ctx = BoardContext::new(13).unwrap();
    let path = temp_path("size-13");
    let game = random_game(&ctx, 4);
    let mut w = ArchiveWriter::create(&path, Arc::clone(&ctx)).unwrap();
    w.encode_game(game.history(), -1).unwrap();
    w.finish().unwrap();

    assert_eq!(verify(&path).unwrap(), game.history().len());
    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.board_size(), 13);
    std::fs::remove_file(&path).ok();
}
