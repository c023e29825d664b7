use std::sync::Arc;

use questboard_core::{
    required_xp_for_level, Caller, DocumentStore, MemoryStore, Mode, NoCalendar, Planner,
    QuestError, TaskInput, TaskStatus, UserProfile, VerifiedIdentity,
};

fn mission(difficulty: &str, category: &str) -> TaskInput {
    TaskInput {
        title: Some(format!("{difficulty} {category} mission")),
        description: None,
        category: Some(category.to_string()),
        difficulty: Some(difficulty.to_string()),
        scheduled_start: Some("2026-03-02T09:00:00Z".to_string()),
        scheduled_end: Some("2026-03-02T10:00:00Z".to_string()),
    }
}

async fn planner_with_hero(id: &str) -> (Planner<MemoryStore, NoCalendar>, Caller) {
    let planner = Planner::new(MemoryStore::new(), NoCalendar);
    let caller = Caller::trusted(id);
    planner
        .sync_profile(&caller, &VerifiedIdentity::default())
        .await
        .unwrap();
    (planner, caller)
}

/// Hard study mission in monk mode: 48 XP and +1 intelligence.
#[tokio::test]
async fn test_monk_hard_study_completion() {
    let (planner, hero) = planner_with_hero("hero").await;

    let task = planner.create_task(&hero, &mission("hard", "study")).await.unwrap();
    assert_eq!(task.xp_reward, 40);

    planner.switch_mode(&hero, Mode::Monk).await.unwrap();
    let before = planner.profile(&hero).await.unwrap();

    let reward = planner.complete_task(&hero, &task.id).await.unwrap();
    assert_eq!(reward.gained_xp, 48);
    assert_eq!(reward.new_stats.intelligence, before.stats().intelligence + 1);

    let after = planner.profile(&hero).await.unwrap();
    assert_eq!(after.current_xp, before.current_xp + 48);
    assert_eq!(after.stats(), reward.new_stats);
    assert_eq!(after.level, before.level);
    assert_eq!(after.next_level_xp, 100);

    let stored = planner.store().get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_recovery_easy_completion_gives_five() {
    let (planner, hero) = planner_with_hero("hero").await;
    planner.switch_mode(&hero, Mode::Recovery).await.unwrap();

    let task = planner.create_task(&hero, &mission("easy", "life")).await.unwrap();
    let reward = planner.complete_task(&hero, &task.id).await.unwrap();

    assert_eq!(reward.gained_xp, 5);
    assert_eq!(reward.new_stats.balance, 1);
}

#[tokio::test]
async fn test_crossing_threshold_levels_up_once() {
    let (planner, hero) = planner_with_hero("hero").await;

    // Three hard missions reach 120 XP: level 2 exactly once.
    let mut last = None;
    for _ in 0..3 {
        let task = planner.create_task(&hero, &mission("hard", "work")).await.unwrap();
        last = Some(planner.complete_task(&hero, &task.id).await.unwrap());
    }
    let last = last.unwrap();
    assert!(last.leveled_up);
    assert_eq!(last.new_level, 2);

    let profile = planner.profile(&hero).await.unwrap();
    assert_eq!(profile.current_xp, 120);
    assert_eq!(profile.level, 2);
    assert_eq!(profile.next_level_xp, required_xp_for_level(2));
    assert_eq!(profile.stats().discipline, 3);
}

#[tokio::test]
async fn test_surplus_xp_is_not_reevaluated_in_same_completion() {
    let store = MemoryStore::new();
    let now = chrono::Utc::now();
    let mut profile = UserProfile::new("hero", now);
    // One XP short of level 2.
    profile.current_xp = 99;
    store.create_profile_if_absent(profile).await.unwrap();

    let planner = Planner::new(store, NoCalendar);
    let hero = Caller::trusted("hero");
    let task = planner.create_task(&hero, &mission("hard", "gym")).await.unwrap();

    // Force a reward that clears both the level 2 and level 3 thresholds.
    planner
        .store()
        .transact(&task.id, "hero", |r| {
            r.task.as_mut().unwrap().xp_reward = 500;
            Ok(())
        })
        .await
        .unwrap();

    let reward = planner.complete_task(&hero, &task.id).await.unwrap();
    assert_eq!(reward.new_level, 2);

    let profile = planner.profile(&hero).await.unwrap();
    assert_eq!(profile.level, 2);
    assert_eq!(profile.current_xp, 599);
    assert_eq!(profile.next_level_xp, 282);
}

#[tokio::test]
async fn test_completion_preconditions() {
    let (planner, hero) = planner_with_hero("hero").await;
    let rival = Caller::trusted("rival");
    planner
        .sync_profile(&rival, &VerifiedIdentity::default())
        .await
        .unwrap();

    let err = planner.complete_task(&hero, "no-such-task").await.unwrap_err();
    assert!(matches!(err, QuestError::NotFound("task")));

    let task = planner.create_task(&hero, &mission("medium", "health")).await.unwrap();
    let err = planner.complete_task(&rival, &task.id).await.unwrap_err();
    assert!(matches!(err, QuestError::Forbidden));

    planner.complete_task(&hero, &task.id).await.unwrap();
    let after_first = planner.profile(&hero).await.unwrap();

    let err = planner.complete_task(&hero, &task.id).await.unwrap_err();
    assert!(matches!(err, QuestError::Conflict(_)));
    assert_eq!(err.code(), "conflict");
    assert_eq!(planner.profile(&hero).await.unwrap(), after_first);
}

#[tokio::test]
async fn test_completion_without_profile_is_not_found() {
    let planner = Planner::new(MemoryStore::new(), NoCalendar);
    let ghost = Caller::trusted("ghost");
    let task = planner.create_task(&ghost, &mission("easy", "study")).await.unwrap();

    let err = planner.complete_task(&ghost, &task.id).await.unwrap_err();
    assert!(matches!(err, QuestError::NotFound("profile")));
    assert_eq!(
        planner.store().get_task(&task.id).await.unwrap().unwrap().status,
        TaskStatus::Pending
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_completions_grant_once() {
    let (planner, hero) = planner_with_hero("hero").await;
    let planner = Arc::new(planner);

    for _ in 0..20 {
        let task = planner.create_task(&hero, &mission("medium", "study")).await.unwrap();
        let before = planner.profile(&hero).await.unwrap().current_xp;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let planner = Arc::clone(&planner);
                let hero = hero.clone();
                let id = task.id.clone();
                tokio::spawn(async move { planner.complete_task(&hero, &id).await })
            })
            .collect();

        let mut wins = 0;
        let mut conflicts = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(QuestError::Conflict(_)) | Err(QuestError::NotFound(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((wins, conflicts), (1, 1));
        assert_eq!(planner.profile(&hero).await.unwrap().current_xp, before + 20);
    }
}

#[tokio::test]
async fn test_mode_switch_is_not_retroactive() {
    let (planner, hero) = planner_with_hero("hero").await;

    let first = planner.create_task(&hero, &mission("medium", "work")).await.unwrap();
    let r1 = planner.complete_task(&hero, &first.id).await.unwrap();
    assert_eq!(r1.gained_xp, 20);

    planner.switch_mode(&hero, Mode::Monk).await.unwrap();
    let second = planner.create_task(&hero, &mission("medium", "work")).await.unwrap();
    let r2 = planner.complete_task(&hero, &second.id).await.unwrap();
    assert_eq!(r2.gained_xp, 24);

    assert_eq!(planner.profile(&hero).await.unwrap().current_xp, 44);
}

#[tokio::test]
async fn test_profile_sync_and_mode_switch_edges() {
    let planner = Planner::new(MemoryStore::new(), NoCalendar);
    let hero = Caller::trusted("hero");

    let err = planner.switch_mode(&hero, Mode::Monk).await.unwrap_err();
    assert!(matches!(err, QuestError::NotFound("profile")));

    let identity = VerifiedIdentity {
        subject: "hero".to_string(),
        email: Some("hero@example.com".to_string()),
        name: Some("Ada".to_string()),
    };
    let (p, created) = planner.sync_profile(&hero, &identity).await.unwrap();
    assert!(created);
    assert_eq!(p.display_name, "Ada");

    let (p2, created) = planner.sync_profile(&hero, &identity).await.unwrap();
    assert!(!created);
    assert_eq!(p, p2);
}

#[tokio::test]
async fn test_completed_tasks_leave_pending_list_and_reject_updates() {
    let (planner, hero) = planner_with_hero("hero").await;
    let a = planner.create_task(&hero, &mission("easy", "study")).await.unwrap();
    let b = planner.create_task(&hero, &mission("easy", "gym")).await.unwrap();

    planner.complete_task(&hero, &a.id).await.unwrap();

    let pending: Vec<String> = planner
        .pending_tasks(&hero)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(pending, vec![b.id]);

    let patch = TaskInput {
        title: Some("rename".to_string()),
        ..TaskInput::default()
    };
    let err = planner.update_task(&hero, &a.id, &patch).await.unwrap_err();
    assert!(matches!(err, QuestError::Conflict(_)));
}
