#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::num::NonZero;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    use itertools::Itertools;
    use rstest::rstest;
    use unordered_pair::UnorderedPair;
    use varisat::{CnfFormula, Solver};

    use crate::builder::BoardBuilder;
    use crate::cell::CellKind;
    use crate::error::{Error, ModelError, ParseError};
    use crate::location::Location;
    use crate::logic::{totalizer, VarPool};
    use crate::model::{Assignment, Model};
    use crate::solution::{Optimality, Outcome, Solution};
    use crate::solver::{SatEngine, SearchResult, SolveOptions};
    use crate::Board;

    fn board(map: &str) -> Board {
        map.parse().unwrap()
    }

    fn solve(map: &str, budget: usize) -> Outcome {
        board(map).solve(budget, &SolveOptions::default()).unwrap()
    }

    fn solved(map: &str, budget: usize) -> Solution {
        match solve(map, budget) {
            Outcome::Solved(solution) => solution,
            other => panic!("expected a solution, got {other:?}"),
        }
    }

    /// Cells a placement of `blocked` must leave unreachable no matter what.
    fn sealed(board: &Board) -> HashSet<Location> {
        let mut sealed = HashSet::new();
        for location in board.locations() {
            let kind = board.kind(location).unwrap();
            if !board.on_border(location) {
                continue;
            }

            if kind.sealed_on_border() {
                sealed.insert(location);
            }

            if kind.is_portal() {
                sealed.insert(location);
                sealed.extend(board.portal_exit(location));
            }
        }

        sealed
    }

    fn flood(board: &Board, blocked: &HashSet<Location>) -> HashSet<Location> {
        let mut reached = HashSet::from([board.start()]);
        let mut queue = VecDeque::from([board.start()]);

        while let Some(location) = queue.pop_front() {
            for next in board.neighbors(location) {
                if board.kind(next).unwrap().is_water() || blocked.contains(&next) {
                    continue;
                }

                if reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        reached
    }

    /// Try every placement of at most `budget` blockers.
    fn brute_force(board: &Board, budget: usize) -> Option<i64> {
        let sealed = sealed(board);
        let candidates = board.locations()
            .filter(|location| board.kind(*location).unwrap().blockable())
            .collect_vec();

        (0..=budget.min(candidates.len()))
            .flat_map(|size| candidates.iter().copied().combinations(size))
            .filter_map(|placement| {
                let reached = flood(board, &placement.into_iter().collect());
                if reached.iter().any(|location| sealed.contains(location)) {
                    return None;
                }

                Some(reached.iter().map(|location| board.kind(*location).unwrap().weight()).sum::<i64>())
            })
            .max()
    }

    fn assert_valid(board: &Board, budget: usize, solution: &Solution) {
        let blocked: HashSet<Location> = solution.blocker_locations().into_iter().collect();
        assert_eq!(blocked.len(), solution.blockers());
        assert!(solution.blockers() <= budget);

        for location in board.locations() {
            let kind = board.kind(location).unwrap();
            if kind.is_water() {
                assert!(!solution.is_reachable(location));
                assert!(!blocked.contains(&location));
            }
            if blocked.contains(&location) {
                assert!(kind.blockable());
            }
        }

        for location in sealed(board) {
            assert!(!solution.is_reachable(location), "{location} must be unreachable");
        }

        assert!(solution.is_reachable(board.start()));
        let reached = flood(board, &blocked);
        for location in board.locations() {
            assert_eq!(solution.is_reachable(location), reached.contains(&location), "reachability of {location}");
        }

        let score: i64 = reached.iter().map(|location| board.kind(*location).unwrap().weight()).sum();
        assert_eq!(score, solution.objective());
    }

    #[test]
    fn parse_and_print() {
        let map = "~~~~~\n~.H.~\n~1C1~\n~GS.~\n~~~~~\n";
        let board = board(map);

        assert_eq!(board.dims(), (5, 5));
        assert_eq!(board.start(), Location(2, 1));
        assert_eq!(board.kind(Location(2, 2)), Some(CellKind::Bonus));
        assert_eq!(board.kind(Location(1, 3)), Some(CellKind::GoldBonus));
        assert_eq!(board.kind(Location(2, 3)), Some(CellKind::Hazard));
        assert_eq!(board.kind(Location(5, 0)), None);
        assert_eq!(format!("{}", board), map);
    }

    #[test]
    fn parse_tolerates_blank_lines_and_carriage_returns() {
        let board = board("\n~~~\r\n~H~\r\n~~~\r\n\n");
        assert_eq!(format!("{}", board), "~~~\n~H~\n~~~\n");
    }

    #[rstest]
    #[case("", Error::Parse(ParseError::Empty))]
    #[case("\n\n", Error::Parse(ParseError::Empty))]
    #[case("...\n.H\n...", Error::Parse(ParseError::Ragged { row: 1, expected: 3, found: 2 }))]
    #[case("...\n.H.\n..X", Error::Parse(ParseError::UnknownSymbol { symbol: 'X', location: Location(2, 2) }))]
    #[case("...\n.HW\n...", Error::Parse(ParseError::UnexpectedBlocker { location: Location(2, 1) }))]
    #[case("...\n...\n...", Error::Model(ModelError::NoStart))]
    #[case("H..\n...\n..H", Error::Model(ModelError::MultipleStarts { count: 2 }))]
    #[case("a.a\n.H.\n..a", Error::Model(ModelError::PortalOverused { symbol: 'a', count: 3 }))]
    fn rejects_bad_maps(#[case] map: &str, #[case] expected: Error) {
        let err = map.parse::<Board>().unwrap_err();
        assert_eq!(format!("{err:?}"), format!("{expected:?}"));
    }

    #[test]
    fn builder_records_invalid_placements() {
        let dims = (NonZero::new(3).unwrap(), NonZero::new(3).unwrap());

        let mut builder = BoardBuilder::with_dims(dims);
        builder.add_start(Location(1, 1)).set(Location(3, 0), CellKind::Water);
        assert_eq!(builder.is_valid(), Some(&vec![ModelError::OutOfBounds { location: Location(3, 0) }]));
        assert_eq!(builder.build().unwrap_err(), ModelError::OutOfBounds { location: Location(3, 0) });

        let mut builder = BoardBuilder::with_dims(dims);
        builder.add_start(Location(1, 1)).add_portal_pair('A', UnorderedPair(Location(0, 0), Location(2, 2)));
        assert_eq!(builder.build().unwrap_err(), ModelError::BadPortalSymbol { symbol: 'A' });

        let mut builder = BoardBuilder::with_dims(dims);
        builder.add_start(Location(1, 1)).set(Location(0, 0), CellKind::Blocker);
        assert_eq!(builder.build().unwrap_err(), ModelError::PresetBlocker { location: Location(0, 0) });
    }

    #[test]
    fn builder_matches_parsed_board() {
        let mut builder = BoardBuilder::with_dims((NonZero::new(5).unwrap(), NonZero::new(3).unwrap()));
        builder.add_start(Location(1, 1))
            .add_portal_pair('7', UnorderedPair(Location(3, 1), Location(4, 2)))
            .set(Location(0, 0), CellKind::Water);
        let built = builder.build().unwrap();

        assert_eq!(format!("{}", built), "~....\n.H.7.\n....7\n");
        assert_eq!(built.portal_exit(Location(3, 1)), Some(Location(4, 2)));
        assert_eq!(built.portal_exit(Location(4, 2)), Some(Location(3, 1)));
    }

    #[test]
    fn portal_links() {
        let board = board("~~~~~~~\n~H1~1.~\n~~~~~~~\n~~~~~~~\n~~~9~~~\n");

        let from_portal = board.neighbors(Location(2, 1));
        assert_eq!(from_portal.len(), 5);
        assert!(from_portal.contains(&Location(4, 1)));
        assert!(board.links_from(Location(2, 1)).contains(&(Location(4, 1), crate::Link::Portal)));

        // plain cells only know their orthogonal neighbors, even next to a portal
        let from_start = board.neighbors(Location(1, 1));
        assert_eq!(from_start.len(), 4);
        assert!(!from_start.contains(&Location(4, 1)));

        // a lone symbol leads nowhere
        assert_eq!(board.portal_exit(Location(3, 4)), None);
        assert_eq!(board.neighbors(Location(3, 4)).len(), 3);
    }

    #[test]
    fn open_three_by_three_without_budget_is_infeasible() {
        // every neighbor of the start is border land, which must be blocked to stay unreachable
        assert!(matches!(solve("...\n.H.\n...", 0), Outcome::Infeasible));
        assert!(matches!(solve("...\n.H.\n...", 3), Outcome::Infeasible));
    }

    #[test]
    fn open_three_by_three_with_four_blockers() {
        let map = "...\n.H.\n...";
        let solution = solved(map, 4);

        assert_eq!(solution.objective(), 1);
        assert_eq!(solution.blockers(), 4);
        assert_eq!(solution.optimality(), Optimality::Proven);
        assert_eq!(format!("{}", solution), ".W.\nWHW\n.W.\n");
        assert_eq!(solution.render_reachable(), "...\n.#.\n...\n");
        assert_valid(&board(map), 4, &solution);
    }

    #[test]
    fn walled_in_start_needs_no_blockers() {
        let solution = solved("~~~\n~H~\n~~~", 0);

        assert_eq!(solution.objective(), 1);
        assert_eq!(solution.blockers(), 0);
        assert_eq!(solution.optimality(), Optimality::Proven);
    }

    #[test]
    fn border_portal_seals_its_exit() {
        let map = "~~1~~\n~H.1~\n~~~~~";

        // the interior portal cannot be blocked, so the land leading to it must be
        assert!(matches!(solve(map, 0), Outcome::Infeasible));

        let solution = solved(map, 1);
        assert_eq!(format!("{}", solution), "~~1~~\n~HW1~\n~~~~~\n");
        assert!(!solution.is_reachable(Location(2, 0)));
        assert!(!solution.is_reachable(Location(3, 1)));
        assert_eq!(solution.objective(), 1);
        assert_valid(&board(map), 1, &solution);
    }

    #[test]
    fn lone_border_portal_seals_only_itself() {
        let map = "~~~~~\n~H..~\n~~~~9";
        let solution = solved(map, 0);
        assert_eq!(solution.objective(), 3);
        assert!(!solution.is_reachable(Location(4, 2)));
        assert_valid(&board(map), 0, &solution);

        // once paired with an interior portal, the border end seals its exit too
        let map = "~~~~~\n~H.9~\n~~~~9";
        assert!(matches!(solve(map, 0), Outcome::Infeasible));
        let solution = solved(map, 1);
        assert_eq!(solution.objective(), 1);
        assert_eq!(solution.blocker_locations(), vec![Location(2, 1)]);
        assert!(!solution.is_reachable(Location(3, 1)));
    }

    #[test]
    fn portals_teleport() {
        let map = "~~~~~~~\n~H1~1.~\n~~~~~~~";
        let solution = solved(map, 0);

        assert_eq!(solution.objective(), 4);
        assert_eq!(solution.render_reachable(), ".......\n.##.##.\n.......\n");
    }

    #[test]
    fn hazard_is_walled_off() {
        let map = "~~~~~~\n~H.S.~\n~~~~~~";

        // everything reachable: three plain cells and the hazard
        assert_eq!(solved(map, 0).objective(), -1);

        let solution = solved(map, 1);
        assert_eq!(solution.objective(), 1);
        assert_eq!(solution.blocker_locations(), vec![Location(2, 1)]);
        assert_eq!(format!("{}", solution), "~~~~~~\n~HWS.~\n~~~~~~\n");
        assert_eq!(solution.render_reachable(), "......\n.#....\n......\n");
    }

    #[test]
    fn gold_bonus_counts_eleven() {
        assert_eq!(solved("~~~~~~\n~H.G.~\n~~~~~~", 0).objective(), 14);
    }

    #[test]
    fn bonus_on_the_border_is_infeasible() {
        assert!(matches!(solve("~C~\n~H~\n~~~", 5), Outcome::Infeasible));
    }

    #[test]
    fn enclose_the_interior() {
        let map = ".....\n.....\n..H..\n.....\n.....";

        let solution = solved(map, 12);
        assert_eq!(solution.objective(), 9);
        assert_eq!(solution.blockers(), 12);
        assert_eq!(format!("{}", solution), ".WWW.\nW...W\nW.H.W\nW...W\n.WWW.\n");
        assert_valid(&board(map), 12, &solution);

        // one blocker short of sealing every border neighbor of the interior
        let solution = solved(map, 11);
        assert!(solution.objective() < 9);
        assert_valid(&board(map), 11, &solution);
    }

    #[rstest]
    #[case("~~~~~~\n~.H..~\n~.~.C~\n~S...~\n~~~~~~", 0)]
    #[case("~~~~~~\n~.H..~\n~.~.C~\n~S...~\n~~~~~~", 1)]
    #[case("~~~~~~\n~.H..~\n~.~.C~\n~S...~\n~~~~~~", 2)]
    #[case("~~~~~~\n~.H..~\n~.~.C~\n~S...~\n~~~~~~", 3)]
    #[case(".....\n..H..\n.~.C.\n.....", 4)]
    #[case(".....\n..H..\n.~.C.\n.....", 5)]
    #[case(".....\n..H..\n.~.C.\n.....", 6)]
    #[case("~~~~~~~\n~H.~.a~\n~..~.G~\n~a~~..~\n~~~~~~~", 0)]
    #[case("~~~~~~~\n~H.~.a~\n~..~.G~\n~a~~..~\n~~~~~~~", 2)]
    #[case("......\n.H..b.\n......\n.b....", 5)]
    #[case("~~~~~~\n~.GS.~\n~SH.C~\n~..~.~\n~~~~~~", 2)]
    fn matches_brute_force(#[case] map: &str, #[case] budget: usize) {
        let board = board(map);
        let expected = brute_force(&board, budget);

        match board.solve(budget, &SolveOptions::default()).unwrap() {
            Outcome::Solved(solution) => {
                assert_eq!(Some(solution.objective()), expected);
                assert_eq!(solution.optimality(), Optimality::Proven);
                assert_valid(&board, budget, &solution);
            }
            Outcome::Infeasible => assert_eq!(expected, None),
            Outcome::Undecided => panic!("search stopped without limits"),
        }
    }

    #[test]
    fn resolving_gives_the_same_objective() {
        let map = "~~~~~~\n~.GS.~\n~SH.C~\n~..~.~\n~~~~~~";
        assert_eq!(solved(map, 2).objective(), solved(map, 2).objective());
    }

    #[test]
    fn engine_assignments_satisfy_the_model() {
        let board = board("~~~~~~~\n~H.~.a~\n~..~.G~\n~a~~..~\n~~~~~~~");
        let model = Model::formulate(&board, 2);

        let SearchResult::Optimal { assignment, objective, stats } = SatEngine::new(&model).run(&SolveOptions::default()).unwrap() else {
            panic!("expected an optimal result");
        };

        assert_eq!(model.check(&assignment), Ok(()));
        assert_eq!(model.evaluate(&assignment), Ok(objective));
        assert_eq!(assignment.distance[board.id_of(board.start())], 0);
        assert!(stats.sat_calls >= stats.improvements);
    }

    #[test]
    fn model_rejects_unanchored_islands() {
        // two cells enclosed apart from the start, which sits in its own pocket
        let board = board("~~~~~~\n~H~..~\n~~~~~~");
        let model = Model::formulate(&board, 0);
        let cells = board.cell_count();

        let start = board.id_of(board.start());
        let island = [board.id_of(Location(3, 1)), board.id_of(Location(4, 1))];

        let mut assignment = Assignment {
            blocked: vec![false; cells],
            reachable: vec![false; cells],
            distance: vec![-1; cells],
        };
        assignment.reachable[start] = true;
        assignment.distance[start] = 0;
        assert_eq!(model.check(&assignment), Ok(()));

        // the island claims to be one and two steps out, but neither step leads back to the start
        for (step, cell) in island.iter().enumerate() {
            assignment.reachable[*cell] = true;
            assignment.distance[*cell] = step as i64 + 1;
        }
        assert!(model.check(&assignment).is_err());

        // and the engine never reports the island
        let solution = solved("~~~~~~\n~H~..~\n~~~~~~", 0);
        assert_eq!(solution.objective(), 1);
    }

    #[test]
    fn extraction_checks_arity() {
        let board = board("~~~\n~H~\n~~~");
        let assignment = Assignment {
            blocked: vec![false; 4],
            reachable: vec![false; 4],
            distance: vec![-1; 4],
        };

        let err = Solution::extract(&board, &assignment, 1, Optimality::Proven).unwrap_err();
        assert_eq!((err.expected, err.found), (9, 4));

        let ragged = Assignment {
            blocked: vec![false; 9],
            reachable: vec![false; 8],
            distance: vec![-1; 9],
        };
        assert!(Solution::extract(&board, &ragged, 1, Optimality::Proven).is_err());
    }

    #[test]
    fn stops_early_on_request() {
        let map = ".....\n.....\n..H..\n.....\n.....";

        let options = SolveOptions::default().with_time_limit(Duration::ZERO);
        assert!(matches!(board(map).solve(12, &options).unwrap(), Outcome::Undecided));

        let options = SolveOptions::default().with_cancel_flag(Arc::new(AtomicBool::new(true)));
        assert!(matches!(board(map).solve(12, &options).unwrap(), Outcome::Undecided));

        let options = SolveOptions::default().with_max_improvements(1);
        let Outcome::Solved(solution) = board(map).solve(12, &options).unwrap() else {
            panic!("expected a solution");
        };
        // the first placement found is accepted and the search stops short of the proven 9
        assert_eq!(solution.optimality(), Optimality::BestFound);
        assert!(solution.objective() < 9);
        assert_valid(&board(map), 12, &solution);
    }

    #[test]
    fn unbounded_budget() {
        let solution = solved("~~~\n~H~\n~~~", usize::MAX);
        assert_eq!(solution.objective(), 1);
        assert_eq!(solution.blockers(), 0);

        let map = ".....\n.....\n..H..\n.....\n.....";
        let solution = solved(map, usize::MAX);
        assert_eq!(solution.objective(), 9);
        assert_eq!(solution.optimality(), Optimality::Proven);
        assert_valid(&board(map), usize::MAX, &solution);
    }

    #[test]
    fn totalizer_counts() {
        for true_inputs in 0..=5 {
            for cap in [2, 5] {
                let mut pool = VarPool::new(5);
                let inputs = (0..5).map(|i| varisat::Var::from_index(i).positive()).collect_vec();
                let mut clauses = Vec::new();
                let outputs = totalizer(&mut pool, &inputs, cap, &mut clauses);
                assert_eq!(outputs.len(), cap);

                clauses.extend((0..5).map(|i| vec![inputs[i].var().lit(i < true_inputs)]));

                let mut solver = Solver::new();
                solver.add_formula(&CnfFormula::from(clauses));
                assert!(solver.solve().unwrap());
                let model = solver.model().unwrap();

                for (i, output) in outputs.iter().enumerate() {
                    let value = model.iter().any(|lit| lit == output);
                    assert_eq!(value, true_inputs > i, "output {i} with {true_inputs} true inputs, cap {cap}");
                }
            }
        }
    }
}
