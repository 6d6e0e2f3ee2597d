use dao_policy_registry::error::UnauthorizedReason;
use dao_policy_registry::events::{ChangeEventKind, ChangeLog};
use dao_policy_registry::runtime::dispatcher::SET_TYPE_POLICY_ACTION;
use dao_policy_registry::{
    ActionDescriptor, Address, ApprovalMode, ChangeOutcome, DispatchError, DispatchOutcome, GovernanceDispatcher,
    PolicyChangeRequest, PolicyError, PolicyRegistry, PolicyRule, PolicyTarget, TypeKey,
};

const DAO: Address = Address::new([0xDA; 32]);
const COUNCIL: Address = Address::new([0xC0; 32]);
const STRANGER: Address = Address::new([0x55; 32]);

fn key(s: &str) -> TypeKey {
    TypeKey::parse(s).unwrap()
}

fn setup() -> GovernanceDispatcher {
    let mut dispatcher = GovernanceDispatcher::new(DAO, PolicyRegistry::new());
    dispatcher
        .submit(PolicyChangeRequest::RegisterCouncil { council: COUNCIL }, DAO, 1)
        .unwrap();
    dispatcher
}

fn set_rule(target: PolicyTarget, rule: PolicyRule) -> PolicyChangeRequest {
    PolicyChangeRequest::SetRule { target, rule }
}

fn unauthorized(reason: UnauthorizedReason) -> DispatchError {
    DispatchError::Policy(PolicyError::Unauthorized(reason))
}

#[test]
fn test_tc_4_1_proposer_must_be_dao_or_council() {
    let mut dispatcher = setup();
    let request = set_rule(PolicyTarget::Type(key("vault::SpendAction")), PolicyRule::dao_only());

    assert_eq!(
        dispatcher.submit(request.clone(), STRANGER, 10),
        Err(unauthorized(UnauthorizedReason::RequiresDaoOrCouncil))
    );
    assert_eq!(
        dispatcher.submit(PolicyChangeRequest::RegisterCouncil { council: STRANGER }, COUNCIL, 10),
        Err(unauthorized(UnauthorizedReason::RequiresDao))
    );
    assert!(dispatcher.submit(request, COUNCIL, 10).is_ok());
}

#[test]
fn test_tc_4_2_meta_policy_gates_type_changes() {
    let mut dispatcher = setup();
    let meta = PolicyRule::dao_only().with_change_control(ApprovalMode::CouncilOnly, Some(COUNCIL), 0);
    dispatcher
        .submit(set_rule(PolicyTarget::Type(key(SET_TYPE_POLICY_ACTION)), meta), DAO, 10)
        .unwrap();

    let request = set_rule(
        PolicyTarget::Type(key("vault::SpendAction")),
        PolicyRule::execution(ApprovalMode::DaoOrCouncil, Some(COUNCIL)),
    );
    assert_eq!(
        dispatcher.submit(request.clone(), DAO, 20),
        Err(unauthorized(UnauthorizedReason::RequiresCouncil))
    );
    assert_eq!(
        dispatcher.submit(request, COUNCIL, 20),
        Ok(DispatchOutcome::Changed(ChangeOutcome::Applied))
    );

    // Object targets are governed by a different meta key.
    let object = set_rule(PolicyTarget::Object(Address::new([3; 32])), PolicyRule::dao_only());
    assert!(dispatcher.submit(object, DAO, 30).is_ok());
}

#[test]
fn test_tc_4_3_existing_rule_gates_its_own_change() {
    let mut dispatcher = setup();
    let pool = PolicyTarget::Object(Address::new([0x9A; 32]));
    let locked = PolicyRule::execution(ApprovalMode::CouncilOnly, Some(COUNCIL));
    dispatcher.submit(set_rule(pool.clone(), locked), DAO, 10).unwrap();

    // Change mode is DAO-only, so the council cannot loosen it.
    assert_eq!(
        dispatcher.submit(PolicyChangeRequest::RemoveRule { target: pool.clone() }, COUNCIL, 20),
        Err(unauthorized(UnauthorizedReason::RequiresDao))
    );
    assert!(dispatcher
        .submit(PolicyChangeRequest::RemoveRule { target: pool }, DAO, 20)
        .is_ok());
}

#[test]
fn test_tc_4_4_batch_rolls_back_on_failure() {
    let mut dispatcher = setup();
    let before = dispatcher.registry().clone();
    let events_before = dispatcher.events().len();

    let batch = vec![
        set_rule(PolicyTarget::Type(key("a::Fine")), PolicyRule::dao_only()),
        PolicyChangeRequest::RegisterCouncil {
            council: Address::new([0x77; 32]),
        },
        // Council-requiring mode without a council.
        set_rule(
            PolicyTarget::Type(key("a::Broken")),
            PolicyRule::execution(ApprovalMode::CouncilOnly, None),
        ),
    ];
    let err = dispatcher.submit_batch(batch, DAO, 50).unwrap_err();
    assert_eq!(
        err,
        DispatchError::Policy(PolicyError::MissingCouncilId {
            mode: ApprovalMode::CouncilOnly
        })
    );
    assert_eq!(dispatcher.registry(), &before);
    assert_eq!(dispatcher.events().len(), events_before);
}

#[test]
fn test_tc_4_5_batch_sees_its_own_earlier_changes() {
    let mut dispatcher = GovernanceDispatcher::new(DAO, PolicyRegistry::new());
    let new_council = Address::new([0x42; 32]);
    let target = PolicyTarget::Type(key("docs::AddDocumentAction"));

    let outcomes = dispatcher
        .submit_batch(
            vec![
                PolicyChangeRequest::RegisterCouncil { council: new_council },
                set_rule(
                    target.clone(),
                    PolicyRule::execution(ApprovalMode::DaoAndCouncil, Some(new_council)),
                ),
            ],
            DAO,
            5,
        )
        .unwrap();
    assert_eq!(outcomes[0], DispatchOutcome::CouncilRegistered { newly_registered: true });
    assert!(dispatcher.registry().is_council_registered(&new_council));

    // The freshly registered council can now propose.
    let outcome = dispatcher
        .submit(PolicyChangeRequest::SetDefaultFileRule { rule: PolicyRule::dao_only() }, new_council, 6)
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::DefaultFileRuleUpdated);
}

#[test]
fn test_tc_4_6_finalize_is_permissionless() {
    let mut dispatcher = setup();
    let target = PolicyTarget::File("treasury-policy".to_string());
    let slow = PolicyRule::dao_only().with_change_control(ApprovalMode::DaoOnly, None, 1_000);
    dispatcher.submit(set_rule(target.clone(), slow), DAO, 10).unwrap();

    let next = PolicyRule::execution(ApprovalMode::DaoOrCouncil, Some(COUNCIL));
    assert_eq!(
        dispatcher.submit(set_rule(target.clone(), next.clone()), DAO, 20),
        Ok(DispatchOutcome::Changed(ChangeOutcome::Scheduled { effective_at_ms: 1_020 }))
    );

    assert_eq!(
        dispatcher.submit(PolicyChangeRequest::FinalizePending { target: target.clone() }, STRANGER, 500),
        Err(DispatchError::Policy(PolicyError::DelayNotElapsed {
            effective_at_ms: 1_020,
            now_ms: 500
        }))
    );
    assert_eq!(
        dispatcher.submit(PolicyChangeRequest::FinalizePending { target }, STRANGER, 1_020),
        Ok(DispatchOutcome::Finalized(next))
    );
}

#[test]
fn test_tc_4_7_cancel_and_cleanup() {
    let mut dispatcher = setup();
    let a = PolicyTarget::Type(key("stream::PauseStreamAction"));
    let b = PolicyTarget::Type(key("stream::ResumeStreamAction"));
    let slow = PolicyRule::dao_only().with_change_control(ApprovalMode::DaoOnly, None, 100);
    dispatcher
        .submit_batch(vec![set_rule(a.clone(), slow.clone()), set_rule(b.clone(), slow)], DAO, 10)
        .unwrap();
    dispatcher
        .submit_batch(
            vec![
                set_rule(a.clone(), PolicyRule::dao_only()),
                set_rule(b.clone(), PolicyRule::dao_only()),
            ],
            DAO,
            20,
        )
        .unwrap();

    assert_eq!(
        dispatcher.submit(PolicyChangeRequest::CancelPending { target: a.clone() }, DAO, 30),
        Ok(DispatchOutcome::Cancelled)
    );
    assert_eq!(dispatcher.registry().pending_count(), 1);

    let later = 20 + dispatcher.registry().config().abandonment_threshold_ms + 1;
    let outcome = dispatcher
        .submit(
            PolicyChangeRequest::CleanupAbandoned {
                candidates: vec![a, b.clone()],
            },
            STRANGER,
            later,
        )
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Cleaned { removed: 1 });
    assert_eq!(dispatcher.registry().pending_count(), 0);
    assert_eq!(
        dispatcher.events().last().map(|e| &e.kind),
        Some(&ChangeEventKind::ChangeAbandoned { target: b })
    );
}

#[test]
fn test_tc_4_8_event_chain_verifies() {
    let mut dispatcher = setup();
    dispatcher
        .submit(set_rule(PolicyTarget::Type(key("a::One")), PolicyRule::dao_only()), DAO, 10)
        .unwrap();
    dispatcher
        .submit(
            PolicyChangeRequest::SetDefaultFileRule {
                rule: PolicyRule::dao_only().with_change_control(ApprovalMode::DaoOrCouncil, Some(COUNCIL), 0),
            },
            DAO,
            10,
        )
        .unwrap();
    dispatcher
        .submit(PolicyChangeRequest::ClearDefaultFileRule, COUNCIL, 11)
        .unwrap();

    let log = dispatcher.change_log();
    assert_eq!(log.len(), 4);
    let sequences: Vec<u64> = log.events().iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert_eq!(log.events()[3].actor, COUNCIL);
    assert!(ChangeLog::verify_chain(log.events(), &log.head()));
}

#[test]
fn test_tc_4_9_late_clock_does_not_block_changes() {
    let mut dispatcher = setup();
    let target = PolicyTarget::Type(key("vault::SpendAction"));
    let guarded = PolicyRule::dao_only().with_change_control(ApprovalMode::DaoOnly, None, 1_000);
    dispatcher.submit(set_rule(target.clone(), guarded), DAO, 100).unwrap();
    dispatcher
        .submit(set_rule(target.clone(), PolicyRule::execution(ApprovalMode::CouncilOnly, Some(COUNCIL))), DAO, 200)
        .unwrap();

    // Cancelling has no time precondition, so an earlier clock must not matter.
    assert_eq!(
        dispatcher.submit(PolicyChangeRequest::CancelPending { target: target.clone() }, DAO, 150),
        Ok(DispatchOutcome::Cancelled)
    );
    assert!(dispatcher.registry().pending_change(&target).is_none());

    let last = dispatcher.events().last().unwrap();
    assert_eq!(last.kind, ChangeEventKind::ChangeCancelled { target });
    assert_eq!(last.timestamp_ms, 200);
    assert!(ChangeLog::verify_chain(dispatcher.events(), &dispatcher.change_log().head()));
}

#[test]
fn test_tc_4_9b_rule_must_name_registered_councils() {
    let mut dispatcher = setup();
    let unknown = Address::new([0x77; 32]);
    let target = PolicyTarget::Type(key("pool::UpdatePoolAction"));
    let before = dispatcher.registry().clone();

    let locked_out = PolicyRule::dao_only().with_change_control(ApprovalMode::CouncilOnly, Some(unknown), 0);
    assert_eq!(
        dispatcher.submit(set_rule(target.clone(), locked_out.clone()), DAO, 10),
        Err(DispatchError::Policy(PolicyError::UnregisteredCouncil { council: unknown }))
    );
    assert_eq!(
        dispatcher.submit(
            PolicyChangeRequest::SetDefaultFileRule {
                rule: PolicyRule::execution(ApprovalMode::CouncilOnly, Some(unknown)),
            },
            DAO,
            10,
        ),
        Err(DispatchError::Policy(PolicyError::UnregisteredCouncil { council: unknown }))
    );
    assert_eq!(dispatcher.registry(), &before);

    // Registering first, in the same batch, is enough; the rule stays changeable.
    dispatcher
        .submit_batch(
            vec![
                PolicyChangeRequest::RegisterCouncil { council: unknown },
                set_rule(target.clone(), locked_out),
            ],
            DAO,
            20,
        )
        .unwrap();
    assert!(dispatcher
        .submit(PolicyChangeRequest::RemoveRule { target }, unknown, 30)
        .is_ok());
}

#[test]
fn test_tc_4_9c_retained_events_are_bounded() {
    let mut dispatcher = GovernanceDispatcher::with_change_log(DAO, PolicyRegistry::new(), ChangeLog::with_retention(4));
    for i in 0..10u64 {
        dispatcher
            .submit(set_rule(PolicyTarget::Type(key(&format!("a::Action{}", i))), PolicyRule::dao_only()), DAO, i)
            .unwrap();
    }
    assert_eq!(dispatcher.events().len(), 4);
    assert_eq!(dispatcher.change_log().last_sequence(), 10);
    assert!(dispatcher.change_log().verify_retained());

    let drained = dispatcher.drain_events();
    assert_eq!(drained.first().map(|e| e.sequence), Some(7));
    assert!(dispatcher.events().is_empty());
    assert_eq!(dispatcher.registry().type_rule_count(), 10);
}

#[test]
fn test_tc_4_10_authorize_execution() {
    let mut dispatcher = setup();
    dispatcher
        .submit(
            set_rule(
                PolicyTarget::Type(key("custody::ApproveCustodyAction")),
                PolicyRule::execution(ApprovalMode::DaoAndCouncil, Some(COUNCIL)),
            ),
            DAO,
            10,
        )
        .unwrap();

    let batch = [
        ActionDescriptor::new(key("vault::SpendAction<0x2::sui::SUI>"), Vec::new()),
        ActionDescriptor::new(key("custody::ApproveCustodyAction<0xabc::cap::Cap>"), Vec::new()),
    ];
    let requirement = dispatcher.analyze(&batch);
    assert_eq!(requirement.mode, ApprovalMode::DaoAndCouncil);
    assert_eq!(requirement.council_id, Some(COUNCIL));
    assert!(dispatcher.authorize_execution(&batch, true, true));
    assert!(!dispatcher.authorize_execution(&batch, true, false));
}

#[cfg(feature = "runtime")]
mod shared {
    use super::*;
    use dao_policy_registry::runtime::SharedDispatcher;

    #[tokio::test]
    async fn test_tc_4_11_concurrent_submitters_are_serialized() {
        let shared = SharedDispatcher::new(setup());
        let mut handles = Vec::new();
        for i in 0..8u8 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                let target = PolicyTarget::Type(key(&format!("a::Action{}", i)));
                shared.submit(set_rule(target, PolicyRule::dao_only()), DAO, 100).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let snapshot = shared.snapshot().await;
        assert_eq!(snapshot.registry().type_rule_count(), 8);
        assert_eq!(snapshot.events().len(), 9);
        assert!(ChangeLog::verify_chain(snapshot.events(), &snapshot.change_log().head()));
    }
}
