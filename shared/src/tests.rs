#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;
    use crate::irv::{majority_threshold, resolve, tally, Outcome};
    use crate::leaderboard::{declared_winner, leader, rank};
    use crate::models::{BookDetails, Poll, PollStatus, SubmitBookRequest};
    use crate::validation::*;

    fn ballots(groups: &[(usize, &[&'static str])]) -> Vec<Vec<&'static str>> {
        groups.iter()
            .flat_map(|(n, ranking)| std::iter::repeat(ranking.to_vec()).take(*n))
            .collect()
    }

    #[test]
    fn test_no_votes() {
        let result = resolve(&["A", "B", "C"], &[]);
        assert_eq!(result.outcome, Outcome::NoVotes);
        assert!(result.rounds.is_empty());
        assert_eq!(result.candidates.len(), 3);
        assert!(result.candidates.iter().all(|c| !c.is_winner && c.eliminated_in == 0 && c.votes == 0));
    }

    #[test]
    fn test_majority_in_first_round() {
        let b = ballots(&[(5, &["B1", "B2", "B3"])]);
        let result = resolve(&["B1", "B2", "B3"], &b);

        assert_eq!(result.outcome, Outcome::Winner("B1"));
        assert_eq!(result.rounds.len(), 1);
        let round = &result.rounds[0];
        assert_eq!(round.counts, vec![("B1", 5), ("B2", 0), ("B3", 0)]);
        assert_eq!(round.threshold, 3);
        assert!(round.eliminated.is_empty());
        assert_eq!(round.winner, Some("B1"));
        assert!(result.candidate(&"B1").unwrap().is_winner);
    }

    #[test]
    fn test_one_elimination_then_majority() {
        let b = ballots(&[
            (2, &["B1", "B2", "B3"]),
            (2, &["B2", "B1", "B3"]),
            (1, &["B3", "B1", "B2"]),
        ]);
        let result = resolve(&["B1", "B2", "B3"], &b);

        assert_eq!(result.rounds.len(), 2);
        let first = &result.rounds[0];
        assert_eq!(first.counts, vec![("B1", 2), ("B2", 2), ("B3", 1)]);
        assert_eq!(first.threshold, 3);
        assert_eq!(first.eliminated, vec!["B3"]);
        assert_eq!(first.winner, None);

        let second = &result.rounds[1];
        assert_eq!(second.counts, vec![("B1", 3), ("B2", 2)]);
        assert_eq!(second.winner, Some("B1"));
        assert_eq!(result.outcome, Outcome::Winner("B1"));

        let b3 = result.candidate(&"B3").unwrap();
        assert_eq!(b3.eliminated_in, 1);
        assert_eq!(b3.votes, 1);
        assert_eq!(b3.round_votes, vec![1]);
        assert_eq!(result.candidate(&"B1").unwrap().round_votes, vec![2, 3]);
    }

    #[test]
    fn test_mutual_tie_has_no_winner() {
        let b = ballots(&[(1, &["X", "Y"]), (1, &["Y", "X"])]);
        let result = resolve(&["X", "Y"], &b);

        assert_eq!(result.outcome, Outcome::NoWinner);
        assert_eq!(result.winner(), None);
        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.rounds[0].eliminated, vec!["X", "Y"]);
        assert!(result.candidates.iter().all(|c| !c.is_winner && c.eliminated_in == 1));
    }

    #[test]
    fn test_exhausted_ballot_stops_counting() {
        let b = ballots(&[
            (2, &["A", "B"]),
            (2, &["B", "A"]),
            (1, &["C"]),
        ]);
        let result = resolve(&["A", "B", "C"], &b);

        assert_eq!(result.rounds[0].eliminated, vec!["C"]);
        let second = &result.rounds[1];
        assert_eq!(second.exhausted, 1);
        assert_eq!(second.total, 4);
        assert_eq!(second.counts, vec![("A", 2), ("B", 2)]);
        // A and B tie at the minimum of the shrunken electorate.
        assert_eq!(result.outcome, Outcome::NoWinner);
    }

    #[test]
    fn test_round_totals_match_non_exhausted_ballots() {
        let b = ballots(&[
            (3, &["A", "D"]),
            (2, &["B"]),
            (2, &["C", "B"]),
            (1, &["D"]),
            (1, &["E", "C"]),
        ]);
        let result = resolve(&["A", "B", "C", "D", "E"], &b);

        for round in &result.rounds {
            let counted: u64 = round.counts.iter().map(|(_, c)| c).sum();
            assert_eq!(counted, round.total);
            assert_eq!(round.total + round.exhausted, b.len() as u64);
        }
        assert_eq!(result.rounds[1].exhausted, 1);
        assert_eq!(result.rounds[2].exhausted, 3);
        assert_eq!(result.outcome, Outcome::NoWinner);
    }

    #[test]
    fn test_lone_survivor_gets_synthetic_round() {
        let b = ballots(&[(2, &["A"]), (1, &["B"]), (1, &["C"])]);
        let result = resolve(&["A", "B", "C"], &b);

        // Round 1: A 2, B 1, C 1 of 4, threshold 3; B and C are both eliminated.
        assert_eq!(result.rounds[0].eliminated, vec!["B", "C"]);
        let last = result.rounds.last().unwrap();
        assert_eq!(last.number, 2);
        assert_eq!(last.counts, vec![("A", 4)]);
        assert_eq!(result.outcome, Outcome::Winner("A"));
        assert_eq!(result.candidate(&"A").unwrap().votes, 4);
    }

    #[test]
    fn test_single_candidate_wins_without_rounds_of_elimination() {
        let b = ballots(&[(1, &["Only"])]);
        let result = resolve(&["Only"], &b);
        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.rounds[0].number, 1);
        assert_eq!(result.outcome, Outcome::Winner("Only"));
    }

    #[test]
    fn test_unknown_ids_in_ballots_are_skipped() {
        let b = ballots(&[(2, &["ghost", "A"]), (1, &["B"])]);
        let result = resolve(&["A", "B"], &b);
        assert_eq!(result.rounds[0].counts, vec![("A", 2), ("B", 1)]);
        assert_eq!(result.outcome, Outcome::Winner("A"));
    }

    #[test]
    fn test_tie_at_half_is_not_majority() {
        assert_eq!(majority_threshold(4), 3);
        assert_eq!(majority_threshold(5), 3);
        assert_eq!(majority_threshold(0), 1);

        let b = ballots(&[(2, &["A", "B"]), (1, &["B", "A"]), (1, &["C", "B"])]);
        let result = resolve(&["A", "B", "C"], &b);
        assert_eq!(result.rounds[0].winner, None);
        assert_eq!(result.rounds[0].eliminated, vec!["B", "C"]);
        assert_eq!(result.outcome, Outcome::Winner("A"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let candidates: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let b: Vec<Vec<Uuid>> = vec![
            vec![candidates[0], candidates[2]],
            vec![candidates[1], candidates[0]],
            vec![candidates[2], candidates[3], candidates[1]],
            vec![candidates[3]],
            vec![candidates[1]],
        ];
        let first = resolve(&candidates, &b);
        let second = resolve(&candidates, &b);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_live_tally_skips_elimination() {
        let b = ballots(&[(2, &["A", "B"]), (2, &["B", "A"]), (1, &["C", "A"])]);
        let live = tally(&["A", "B", "C"], &b, false);
        assert_eq!(live.outcome, Outcome::Pending);
        assert_eq!(live.rounds.len(), 1);
        assert!(live.rounds[0].eliminated.is_empty());
        assert_eq!(live.rounds[0].counts, vec![("A", 2), ("B", 2), ("C", 1)]);

        let fin = tally(&["A", "B", "C"], &b, true);
        assert_eq!(fin.outcome, Outcome::Winner("A"));
        assert_eq!(fin, resolve(&["A", "B", "C"], &b));

        assert_eq!(tally::<&str>(&["A"], &[], false).outcome, Outcome::Pending);
    }

    #[test]
    fn test_leaderboard_ordering() {
        let b = ballots(&[
            (2, &["A", "B", "C"]),
            (2, &["B", "C"]),
            (1, &["C", "A"]),
        ]);
        let entries = rank(&["A", "B", "C", "D"], &b);
        let order: Vec<_> = entries.iter().map(|e| e.candidate).collect();
        // A and B tie on first choices; A averages 1.33, B averages 1.5.
        assert_eq!(order, vec!["A", "B", "C", "D"]);

        let a = &entries[0];
        assert_eq!(a.first_choice_votes, 2);
        assert_eq!(a.total_votes, 3);
        assert!((a.average_rank.unwrap() - 4.0 / 3.0).abs() < 1e-9);

        let d = &entries[3];
        assert_eq!(d.total_votes, 0);
        assert_eq!(d.average_rank, None);
    }

    #[test]
    fn test_leaderboard_can_disagree_with_irv() {
        let b = ballots(&[
            (4, &["P", "Q"]),
            (3, &["Q", "P"]),
            (2, &["R", "Q"]),
        ]);
        let entries = rank(&["P", "Q", "R"], &b);
        assert_eq!(leader(&entries).unwrap().candidate, "P");
        assert_eq!(resolve(&["P", "Q", "R"], &b).outcome, Outcome::Winner("Q"));
    }

    #[test]
    fn test_declared_winner_requires_closed_and_first_choice() {
        let b = ballots(&[(1, &["A"])]);
        let entries = rank(&["A", "B"], &b);
        assert!(declared_winner(&entries, false).is_none());
        assert_eq!(declared_winner(&entries, true).unwrap().candidate, "A");

        let empty = rank(&["A", "B"], &[]);
        assert!(declared_winner(&empty, true).is_none());
    }

    #[test]
    fn test_poll_time_closure() {
        let now = OffsetDateTime::now_utc();
        let mut poll = Poll::new(Uuid::new_v4(), now + Duration::hours(1), Uuid::new_v4());
        assert_eq!(poll.status, PollStatus::Submission);
        assert!(!poll.is_closed_at(now));
        assert!(poll.is_closed_at(now + Duration::hours(1)));

        poll.status = PollStatus::Voting;
        let later = now + Duration::hours(2);
        assert_eq!(poll.effective_status(later), PollStatus::Closed);
        assert!(poll.needs_closing(later));
        assert!(!poll.needs_closing(now));
    }

    fn book_request(title: &str, author: &str) -> SubmitBookRequest {
        SubmitBookRequest {
            book_id: "OL123W".into(),
            comment: None,
            book_details: BookDetails {
                title: title.into(),
                author: author.into(),
                ..BookDetails::default()
            },
        }
    }

    #[test]
    fn test_submission_validation() {
        assert!(validate_submission_request(&book_request("Dune", "Frank Herbert")).is_ok());
        assert_eq!(validate_submission_request(&book_request(" ", "x")), Err(ValidationError::EmptyTitle));
        assert_eq!(validate_submission_request(&book_request("Dune", "")), Err(ValidationError::EmptyAuthor));

        let mut request = book_request("Dune", "Frank Herbert");
        request.comment = Some("a".repeat(MAX_COMMENT_LENGTH + 1));
        assert_eq!(validate_submission_request(&request), Err(ValidationError::CommentTooLong));

        assert_eq!(normalize_comment(Some("  ".into())), None);
        assert_eq!(normalize_comment(Some(" great ".into())), Some("great".into()));
    }

    #[test]
    fn test_ranking_validation() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        assert!(validate_rankings(&[ids[1]], &ids).is_ok());
        assert_eq!(validate_rankings(&[], &ids), Err(ValidationError::EmptyRankings));
        assert_eq!(
            validate_rankings(&[ids[0], ids[0]], &ids),
            Err(ValidationError::DuplicateRanking(ids[0]))
        );
        let stranger = Uuid::new_v4();
        assert_eq!(
            validate_rankings(&[ids[0], stranger], &ids),
            Err(ValidationError::UnknownSubmission(stranger))
        );
    }

    #[test]
    fn test_closing_time_validation() {
        let now = OffsetDateTime::now_utc();
        assert!(validate_closes_at(now + Duration::minutes(1), now).is_ok());
        assert_eq!(validate_closes_at(now, now), Err(ValidationError::ClosesInPast));
    }
}
