use std::time::{Duration, Instant};
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use crate::board::{BitArr2D, Board, Move, Side};

/// Score of a finished game won by the searching side; a loss is the negation.
pub const WIN_SCORE: i32 = 9000;
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(20);
/// Returned by `select_move` when the side to move has no placement; callers
/// re-validate it and treat a failure as a pass.
pub const FALLBACK_MOVE: Move = Move { row: 1, col: 1 };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Wall-clock budget for one `select_move` call, checked at every node.
    pub budget: Duration,
    /// Optional cap on the iterative deepening depth.
    pub max_depth: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            max_depth: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub best_move: Option<Move>,
    pub value: i32,
    /// Deepest completed iteration; each one scores every root move.
    pub depth: u32,
    pub nodes: u64,
    pub elapsed_ms: u64,
}

impl SearchReport {
    pub fn chosen(&self) -> Move {
        self.best_move.unwrap_or(FALLBACK_MOVE)
    }
}

/// Fixed parameters of one depth-limited pass.
struct SearchContext {
    side: Side,
    max_depth: u32,
    started: Instant,
    budget: Duration,
}

impl SearchContext {
    fn out_of_time(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

#[derive(Default)]
struct SearchStats {
    nodes: u64,
    /// Set when some node stopped at the depth limit or deadline rather than at
    /// the end of the game.
    horizon_hit: bool,
}

/// Outcome score when the game is over: 0 on a tie, otherwise +/-WIN_SCORE
/// depending on whether material favours `side`.
pub fn terminal_score(board: &Board, side: Side) -> i32 {
    let material = board.material_score() * side.value();
    match material.signum() {
        0 => 0,
        1 => WIN_SCORE,
        _ => -WIN_SCORE,
    }
}

pub fn is_terminal(board: &Board) -> bool {
    board.is_full() || (!board.has_legal_move(Side::Black) && !board.has_legal_move(Side::White))
}

/// Checks shared by both node kinds: a finished game is scored by outcome, and
/// the depth limit or deadline falls back to the heuristic.
fn leaf_value(board: &Board, ctx: &SearchContext, depth: u32, stats: &mut SearchStats) -> Option<i32> {
    stats.nodes += 1;
    if is_terminal(board) {
        return Some(terminal_score(board, ctx.side));
    }
    if depth >= ctx.max_depth || ctx.out_of_time() {
        stats.horizon_hit = true;
        return Some(board.evaluate(ctx.side, depth));
    }
    None
}

/// Node where the opponent of `ctx.side` is to move. Keeps the largest child
/// value, starting from `floor`, and returns `ceiling` once that exceeds it.
fn max_value(board: &mut Board, ctx: &SearchContext, ceiling: i32, floor: i32, depth: u32, stats: &mut SearchStats) -> i32 {
    if let Some(value) = leaf_value(board, ctx, depth, stats) {
        return value;
    }
    let saved = *board;
    let mover = -ctx.side;
    let mut best = floor;
    for (r, c) in saved.legal_moves(mover).iter_set_points() {
        let mv = Move::from_point((r, c));
        let played = board.apply_move(mv.row, mv.col, mover);
        debug_assert!(played, "legal mask offered {} for {:?}", mv, mover);
        let value = min_value(board, ctx, ceiling, best, depth + 1, stats);
        best = best.max(value);
        board.clone_from(&saved);
        if best > ceiling {
            return ceiling;
        }
    }
    best
}

/// Node where `ctx.side` is to move. Keeps the smallest child value, starting
/// from `ceiling`, and returns `floor` once that drops below it.
fn min_value(board: &mut Board, ctx: &SearchContext, ceiling: i32, floor: i32, depth: u32, stats: &mut SearchStats) -> i32 {
    if let Some(value) = leaf_value(board, ctx, depth, stats) {
        return value;
    }
    let saved = *board;
    let mut best = ceiling;
    for (r, c) in saved.legal_moves(ctx.side).iter_set_points() {
        let mv = Move::from_point((r, c));
        let played = board.apply_move(mv.row, mv.col, ctx.side);
        debug_assert!(played, "legal mask offered {} for {:?}", mv, ctx.side);
        let value = max_value(board, ctx, best, floor, depth + 1, stats);
        best = best.min(value);
        board.clone_from(&saved);
        if best < floor {
            return floor;
        }
    }
    best
}

pub struct Engine {
    config: SearchConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl Engine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Target cell for `side`, 1-indexed. Falls back to (1,1) when no placement
    /// exists; the caller must re-check the cell before playing it.
    pub fn select_move(&self, board: &Board, side: Side) -> (usize, usize) {
        let chosen = self.search(board, side).chosen();
        (chosen.row, chosen.col)
    }

    /// Iterative deepening from depth 1 until the budget runs out, the depth cap
    /// is reached, or a pass finishes without touching the horizon.
    ///
    /// Each root placement is scored through the opponent's replies and the
    /// lowest score wins, ties going to the later move in row-major order. The
    /// running best score carries over from one depth to the next, so a deeper
    /// pass only replaces the move when it finds a score no higher than any
    /// seen before.
    pub fn search(&self, board: &Board, side: Side) -> SearchReport {
        let started = Instant::now();
        let candidates = board.legal_moves(side);
        let mut working = *board;
        let mut stats = SearchStats::default();
        let mut best_move = None;
        let mut best_value = WIN_SCORE;
        let mut depth = 0;

        loop {
            depth += 1;
            stats.horizon_hit = false;
            let ctx = SearchContext {
                side,
                max_depth: depth,
                started,
                budget: self.config.budget,
            };

            for point in candidates.iter_set_points() {
                let mv = Move::from_point(point);
                let played = working.apply_move(mv.row, mv.col, side);
                debug_assert!(played, "legal mask offered {} for {:?}", mv, side);
                let value = max_value(&mut working, &ctx, WIN_SCORE, -WIN_SCORE, 1, &mut stats);
                if value <= best_value {
                    best_value = value;
                    best_move = Some(mv);
                }
                working.clone_from(board);
            }
            debug!("depth {} done: best {:?} value {} nodes {}", depth, best_move, best_value, stats.nodes);

            if ctx.out_of_time() || !stats.horizon_hit {
                break;
            }
            if self.config.max_depth.is_some_and(|cap| depth >= cap) {
                break;
            }
        }

        let report = SearchReport {
            best_move,
            value: best_value,
            depth,
            nodes: stats.nodes,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!("Search finished: {}", json!(report));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_engine(max_depth: u32) -> Engine {
        Engine::new(SearchConfig {
            budget: Duration::from_secs(30),
            max_depth: Some(max_depth),
        })
    }

    fn context(side: Side, max_depth: u32) -> SearchContext {
        SearchContext {
            side,
            max_depth,
            started: Instant::now(),
            budget: Duration::from_secs(30),
        }
    }

    /// Plain minimax over the same node pair, without bounds. Agrees with the
    /// pruned pair as long as nobody has to pass inside the tree.
    fn unpruned(board: &Board, side: Side, opponent_to_move: bool, depth: u32, max_depth: u32, start: i32) -> i32 {
        if is_terminal(board) {
            return terminal_score(board, side);
        }
        if depth >= max_depth {
            return board.evaluate(side, depth);
        }
        let mover = if opponent_to_move { -side } else { side };
        let mut best = start;
        for mv in board.legal_move_list(mover) {
            let mut child = *board;
            assert!(child.apply_move(mv.row, mv.col, mover));
            let value = unpruned(&child, side, !opponent_to_move, depth + 1, max_depth, if opponent_to_move { WIN_SCORE } else { -WIN_SCORE });
            best = if opponent_to_move { best.max(value) } else { best.min(value) };
        }
        best
    }

    #[test]
    fn test_terminal_score_sign() {
        let board: Board = format!("{}{}", "B".repeat(40), "W".repeat(24)).parse().unwrap();
        assert_eq!(terminal_score(&board, Side::Black), WIN_SCORE);
        assert_eq!(terminal_score(&board, Side::White), -WIN_SCORE);

        let tied: Board = format!("{}{}", "B".repeat(32), "W".repeat(32)).parse().unwrap();
        assert_eq!(terminal_score(&tied, Side::Black), 0);
        assert_eq!(terminal_score(&tied, Side::White), 0);
    }

    #[test]
    fn test_full_board_is_terminal_before_heuristic() {
        let mut board: Board = format!("{}{}", "W".repeat(50), "B".repeat(14)).parse().unwrap();
        assert!(board.is_full());
        let mut stats = SearchStats::default();
        let value = max_value(&mut board, &context(Side::Black, 1), WIN_SCORE, -WIN_SCORE, 1, &mut stats);
        assert_eq!(value, -WIN_SCORE);
        assert_ne!(value, board.evaluate(Side::Black, 1));
        assert!(!stats.horizon_hit);
        assert_eq!(stats.nodes, 1);
    }

    #[test]
    fn test_depth_one_is_plain_evaluation() {
        let mut board = Board::new();
        assert!(board.apply_move(3, 5, Side::Black));
        assert!(board.apply_move(3, 6, Side::White));
        let ctx = context(Side::Black, 1);
        for mv in board.legal_move_list(Side::Black) {
            let mut child = board;
            assert!(child.apply_move(mv.row, mv.col, Side::Black));
            let expected = child.evaluate(Side::Black, 1);
            let mut stats = SearchStats::default();
            let value = max_value(&mut child, &ctx, WIN_SCORE, -WIN_SCORE, 1, &mut stats);
            assert_eq!(value, expected);
            assert_eq!(stats.nodes, 1);
        }
    }

    #[test]
    fn test_pruning_keeps_root_values() {
        let mut board = Board::new();
        for (row, col, side) in [(3, 5, Side::Black), (3, 4, Side::White), (3, 3, Side::Black), (2, 4, Side::White)] {
            assert!(board.apply_move(row, col, side));
        }
        for max_depth in 1..=3 {
            let ctx = context(Side::Black, max_depth);
            for mv in board.legal_move_list(Side::Black) {
                let mut child = board;
                assert!(child.apply_move(mv.row, mv.col, Side::Black));
                let expected = unpruned(&child, Side::Black, true, 1, max_depth, -WIN_SCORE);
                let mut stats = SearchStats::default();
                let value = max_value(&mut child, &ctx, WIN_SCORE, -WIN_SCORE, 1, &mut stats);
                assert_eq!(value, expected, "move {} at depth {}", mv, max_depth);
            }
        }
    }

    #[test]
    fn test_deadline_cuts_every_node() {
        let mut child = Board::new();
        assert!(child.apply_move(3, 5, Side::Black));
        let ctx = SearchContext {
            side: Side::Black,
            max_depth: 5,
            started: Instant::now(),
            budget: Duration::ZERO,
        };
        let mut stats = SearchStats::default();
        let value = max_value(&mut child, &ctx, WIN_SCORE, -WIN_SCORE, 1, &mut stats);
        assert_eq!(value, child.evaluate(Side::Black, 1));
        assert_eq!(stats.nodes, 1);
        assert!(stats.horizon_hit);
    }

    #[test]
    fn test_best_value_carries_across_depths() {
        let mut board = Board::new();
        for (row, col, side) in [(3, 5, Side::Black), (3, 4, Side::White), (3, 3, Side::Black), (2, 4, Side::White)] {
            assert!(board.apply_move(row, col, side));
        }
        // depth 1 bottoms out at -240 on (5,3) and (6,3); every depth 2 value is
        // higher (best -20 on (5,3)), so the depth 1 choice stands
        let report = quick_engine(2).search(&board, Side::Black);
        assert_eq!(report.depth, 2);
        assert_eq!(report.best_move, Some(Move::new(6, 3)));
        assert_eq!(report.value, -240);

        // depth 3 finds -250 on (6,3), below everything seen so far
        let report = quick_engine(3).search(&board, Side::Black);
        assert_eq!(report.depth, 3);
        assert_eq!(report.best_move, Some(Move::new(6, 3)));
        assert_eq!(report.value, -250);
    }

    #[test]
    fn test_search_restores_board() {
        let board = Board::new();
        let mut working = board;
        let mut stats = SearchStats::default();
        max_value(&mut working, &context(Side::White, 3), WIN_SCORE, -WIN_SCORE, 1, &mut stats);
        assert_eq!(working, board);
        assert!(stats.nodes > 1);
    }

    #[test]
    fn test_opponent_without_reply_returns_floor() {
        // white cannot flank a corner piece and (8,8) is isolated; black can
        // still capture (1,2), so the game is not over
        let mut board: Board = "
            BW______
            ________
            ________
            ________
            ________
            ________
            ________
            _______W".parse().unwrap();
        assert!(!board.has_legal_move(Side::White));
        assert!(board.has_legal_move(Side::Black));
        let mut stats = SearchStats::default();
        let value = max_value(&mut board, &context(Side::Black, 3), 500, -123, 1, &mut stats);
        assert_eq!(value, -123);
    }

    #[test]
    fn test_opening_choice_is_last_of_equals() {
        // the four openings are symmetric, so ties go to the last one
        let board = Board::new();
        for depth in [1, 3] {
            let report = quick_engine(depth).search(&board, Side::Black);
            assert_eq!(report.best_move, Some(Move::new(6, 4)));
            assert_eq!(report.depth, depth);
        }
    }

    #[test]
    fn test_depth_one_prefers_lowest_heuristic() {
        let mut board = Board::new();
        for (row, col, side) in [(3, 5, Side::Black), (3, 4, Side::White), (3, 3, Side::Black), (2, 4, Side::White)] {
            assert!(board.apply_move(row, col, side));
        }
        let scored: Vec<(Move, i32)> = board
            .legal_move_list(Side::Black)
            .into_iter()
            .map(|mv| {
                let mut child = board;
                child.apply_move(mv.row, mv.col, Side::Black);
                (mv, child.evaluate(Side::Black, 1))
            })
            .collect();
        let lowest = scored.iter().map(|&(_, value)| value).min().unwrap();
        let expected = scored.iter().rev().find(|&&(_, value)| value == lowest).unwrap().0;

        let report = quick_engine(1).search(&board, Side::Black);
        assert_eq!(report.best_move, Some(expected));
        assert_eq!(report.value, lowest);
        assert_eq!(report.nodes as usize, scored.len());
    }

    #[test]
    fn test_no_legal_move_falls_back() {
        let board: Board = format!("{}{}", "B".repeat(40), "W".repeat(24)).parse().unwrap();
        let engine = Engine::default();
        let report = engine.search(&board, Side::White);
        assert_eq!(report.best_move, None);
        assert_eq!(report.depth, 1);
        assert_eq!(engine.select_move(&board, Side::White), (1, 1));
    }

    #[test]
    fn test_solved_endgame_stops_early() {
        // one empty cell left: the tree ends inside the first pass
        let board: Board = format!("_W{}", "B".repeat(62)).parse().unwrap();
        let engine = Engine::default();
        let report = engine.search(&board, Side::Black);
        assert_eq!(report.best_move, Some(Move::new(1, 1)));
        assert_eq!(report.value, WIN_SCORE);
        assert_eq!(report.depth, 1);
    }

    #[test]
    fn test_zero_budget_runs_one_pass() {
        let engine = Engine::new(SearchConfig {
            budget: Duration::ZERO,
            max_depth: None,
        });
        let board = Board::new();
        let report = engine.search(&board, Side::Black);
        assert_eq!(report.depth, 1);
        let chosen = report.chosen();
        assert!(board.is_legal(chosen.row, chosen.col, Side::Black));
    }
}
