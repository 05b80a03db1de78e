//! Integration test: block fee allocation through `begin_block`.
//!
//! Exercises the per-block allocation flow:
//! 1. Record the proposer on the first block without allocating
//! 2. Scale the proposer bonus by the share of power that signed
//! 3. Pay every voter by power, signed or not
//! 4. Send truncation dust and the community tax to the pool
//! 5. Allocate every denomination of a multi-denom fee
//! 6. Emit proposer, commission and rewards events
//!
//! This test uses strata-distribution (keeper, events, test chain) and
//! strata-types (coins, votes).

use strata_distribution::events::{
    ATTRIBUTE_KEY_VALIDATOR, EVENT_TYPE_COMMISSION, EVENT_TYPE_PROPOSER_REWARD, EVENT_TYPE_REWARDS,
};
use strata_distribution::invariants::module_account;
use strata_distribution::testing::TestChain;
use strata_types::{Coins, Dec, DecCoins, ValidatorId, VoteInfo};

fn dec(s: &str) -> Dec {
    s.parse().expect("decimal literal")
}

fn outstanding(chain: &mut TestChain, validator: &ValidatorId) -> DecCoins {
    chain
        .query(|keeper, ctx| keeper.query_validator_outstanding_rewards(ctx, validator))
        .expect("outstanding")
}

fn community_pool(chain: &mut TestChain) -> DecCoins {
    chain
        .query(|keeper, ctx| keeper.query_community_pool(ctx))
        .expect("pool")
}

fn two_validators(chain: &mut TestChain) -> (ValidatorId, ValidatorId) {
    let a = chain.create_validator("vala", Dec::zero(), 100).expect("create a");
    let b = chain.create_validator("valb", Dec::zero(), 100).expect("create b");
    (a, b)
}

#[test]
fn first_block_only_records_proposer() {
    let mut chain = TestChain::new();
    let (a, _) = two_validators(&mut chain);
    let votes = chain.last_commit();

    chain.begin_block(&a, &Coins::single("stake", 100), &votes).expect("block 1");

    assert!(outstanding(&mut chain, &a).is_zero());
    assert!(community_pool(&mut chain).is_zero());
    // Fees stay with the collector until the next block.
    let collector = chain.keeper.fee_collector().clone();
    assert_eq!(chain.bank.balance_of(&collector), Coins::single("stake", 100));
}

#[test]
fn absent_voter_reduces_proposer_bonus() {
    // =========================================================
    // Setup: A proposes, B did not sign the previous block
    // =========================================================
    let mut chain = TestChain::new();
    let (a, b) = two_validators(&mut chain);
    let mut votes = chain.last_commit();
    for vote in &mut votes {
        if vote.address == chain.cons_address(&b) {
            vote.signed_last_block = false;
        }
    }
    chain.begin_block(&a, &Coins::new(), &votes).expect("block 1");
    chain.begin_block(&a, &Coins::single("stake", 100), &votes).expect("block 2");

    // =========================================================
    // Proposer: 100 × (0.01 + 0.04 × 0.5) = 3
    // Voters:   100 × 0.95 × 0.5 = 47.5 each
    // =========================================================
    assert_eq!(outstanding(&mut chain, &a).amount_of("stake"), dec("50.5"));
    assert_eq!(outstanding(&mut chain, &b).amount_of("stake"), dec("47.5"));
    assert_eq!(community_pool(&mut chain).amount_of("stake"), dec("2"));
}

#[test]
fn multi_denom_fees_are_split_per_denom() {
    let mut chain = TestChain::new();
    let (a, b) = two_validators(&mut chain);
    let votes = chain.last_commit();
    let fees: Coins = [("stake".to_string(), 1_000), ("photon".to_string(), 10)]
        .into_iter()
        .collect();

    chain.begin_block(&a, &Coins::new(), &votes).expect("block 1");
    chain.begin_block(&a, &fees, &votes).expect("block 2");

    let oa = outstanding(&mut chain, &a);
    let ob = outstanding(&mut chain, &b);
    let pool = community_pool(&mut chain);
    for (denom, amount) in fees.iter() {
        let total = oa.amount_of(denom) + ob.amount_of(denom) + pool.amount_of(denom);
        assert_eq!(total, Dec::from(amount), "denom {denom}");
    }
    assert_eq!(oa.amount_of("photon"), dec("5.15"));

    let report = chain
        .query(|keeper, ctx| module_account(keeper, ctx))
        .expect("module account");
    assert!(!report.broken, "{}", report.message);
}

#[test]
fn indivisible_fees_leave_dust_in_pool() {
    let mut chain = TestChain::new();
    let mut validators = Vec::new();
    for name in ["vala", "valb", "valc"] {
        validators.push(chain.create_validator(name, Dec::with_prec(1, 1), 7).expect("create"));
    }
    let votes = chain.last_commit();
    chain.begin_block(&validators[0], &Coins::new(), &votes).expect("block 1");
    chain
        .begin_block(&validators[0], &Coins::single("stake", 1), &votes)
        .expect("block 2");

    let total: Dec = validators
        .iter()
        .map(|v| outstanding(&mut chain, v).amount_of("stake"))
        .fold(Dec::zero(), |acc, x| acc + x);
    let pool = community_pool(&mut chain).amount_of("stake");
    assert!(pool > dec("0.02"));
    assert_eq!(total + pool, Dec::one());
}

#[test]
fn allocation_emits_events() {
    let mut chain = TestChain::new();
    let a = chain.create_validator("vala", Dec::with_prec(1, 1), 100).expect("create");
    let address = chain.cons_address(&a);
    let votes = vec![VoteInfo {
        address,
        power: 100,
        signed_last_block: true,
    }];
    chain.collect_fees(&Coins::single("stake", 100));

    let events = chain
        .run(|keeper, ctx| {
            keeper.allocate_tokens(ctx, 100, 100, &address, &votes)?;
            Ok(ctx.take_events())
        })
        .expect("allocate");

    let proposer = events
        .iter()
        .find(|e| e.kind == EVENT_TYPE_PROPOSER_REWARD)
        .expect("proposer event");
    assert_eq!(proposer.get(ATTRIBUTE_KEY_VALIDATOR), Some(a.as_str()));
    // Once for the proposer reward and once for the vote.
    assert_eq!(events.iter().filter(|e| e.kind == EVENT_TYPE_COMMISSION).count(), 2);
    assert_eq!(events.iter().filter(|e| e.kind == EVENT_TYPE_REWARDS).count(), 2);
}
