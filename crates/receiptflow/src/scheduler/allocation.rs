//! Priority-weighted split of the global worker budget across queues.

use std::collections::BTreeMap;

use super::error::SchedulerError;
use super::queue::{QueueConfiguration, QueueName};

/// Workers per queue. Queues with priority 0 are present with a count of 0.
pub type WorkerAllocation = BTreeMap<QueueName, usize>;

/// Distributes `concurrency` workers across `queues` proportionally to priority.
///
/// Every queue with a positive priority gets at least one worker, and the
/// total always equals `concurrency` when at least one queue is active.
pub fn allocate_workers(
    concurrency: usize,
    queues: &[QueueConfiguration],
) -> Result<WorkerAllocation, SchedulerError> {
    let mut allocation: WorkerAllocation = queues.iter().map(|q| (q.name, 0)).collect();

    let active: Vec<&QueueConfiguration> = queues.iter().filter(|q| q.priority > 0).collect();
    if active.is_empty() {
        return Ok(allocation);
    }
    if concurrency == 0 {
        return Err(SchedulerError::NoConcurrency);
    }
    if concurrency < active.len() {
        return Err(SchedulerError::InsufficientConcurrency {
            concurrency,
            active_queues: active.len(),
        });
    }

    let total_priority: i64 = active.iter().map(|q| i64::from(q.priority)).sum();

    struct Share<'a> {
        queue: &'a QueueConfiguration,
        ideal: f64,
        count: usize,
    }

    let mut shares: Vec<Share> = active
        .iter()
        .map(|q| {
            let ideal = concurrency as f64 * f64::from(q.priority) / total_priority as f64;
            Share {
                queue: q,
                ideal,
                count: (ideal.floor() as usize).max(1),
            }
        })
        .collect();

    let mut assigned: usize = shares.iter().map(|s| s.count).sum();

    // The minimum of one can overshoot; take the excess back from the largest lanes.
    while assigned > concurrency {
        let Some(largest) = shares
            .iter_mut()
            .filter(|s| s.count > 1)
            .max_by(|a, b| {
                a.count
                    .cmp(&b.count)
                    .then_with(|| b.queue.priority.cmp(&a.queue.priority))
            })
        else {
            break;
        };
        largest.count -= 1;
        assigned -= 1;
    }

    // Hand out what is left by largest remainder, ties going to higher priority.
    while assigned < concurrency {
        let Some(next) = shares.iter_mut().max_by(|a, b| {
            let ra = a.ideal - a.count as f64;
            let rb = b.ideal - b.count as f64;
            ra.total_cmp(&rb)
                .then_with(|| a.queue.priority.cmp(&b.queue.priority))
        }) else {
            break;
        };
        next.count += 1;
        assigned += 1;
    }

    for share in shares {
        allocation.insert(share.queue.name, share.count);
    }
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::default_queues;

    fn queues(entries: &[(QueueName, i32)]) -> Vec<QueueConfiguration> {
        entries
            .iter()
            .map(|(name, priority)| QueueConfiguration::new(*name, *priority))
            .collect()
    }

    #[test]
    fn test_three_to_one_split() {
        let allocation = allocate_workers(
            10,
            &queues(&[
                (QueueName::ReceiptProcessing, 3),
                (QueueName::BulkOperations, 1),
            ]),
        )
        .unwrap();

        let a = allocation[&QueueName::ReceiptProcessing];
        let b = allocation[&QueueName::BulkOperations];
        assert_eq!((a, b), (8, 2));
        assert!(a >= 3 * b);
        assert_eq!(a + b, 10);
    }

    #[test]
    fn test_default_queues_fill_budget() {
        let allocation = allocate_workers(10, &default_queues()).unwrap();
        assert_eq!(allocation.values().sum::<usize>(), 10);
        assert!(allocation.values().all(|&n| n >= 1));
        assert_eq!(allocation[&QueueName::ReceiptProcessing], 3);
        assert_eq!(allocation[&QueueName::EmailPolling], 2);
    }

    #[test]
    fn test_minimum_one_worker_trims_largest() {
        let allocation = allocate_workers(
            3,
            &queues(&[
                (QueueName::ReceiptProcessing, 100),
                (QueueName::EmailPolling, 1),
                (QueueName::SystemCleanUp, 1),
            ]),
        )
        .unwrap();

        assert_eq!(allocation[&QueueName::ReceiptProcessing], 1);
        assert_eq!(allocation[&QueueName::EmailPolling], 1);
        assert_eq!(allocation[&QueueName::SystemCleanUp], 1);
    }

    #[test]
    fn test_zero_priority_gets_no_workers() {
        let allocation = allocate_workers(
            4,
            &queues(&[
                (QueueName::ReceiptProcessing, 1),
                (QueueName::BulkOperations, 0),
            ]),
        )
        .unwrap();

        assert_eq!(allocation[&QueueName::ReceiptProcessing], 4);
        assert_eq!(allocation[&QueueName::BulkOperations], 0);
    }

    #[test]
    fn test_insufficient_concurrency() {
        let result = allocate_workers(2, &default_queues());
        assert!(matches!(
            result,
            Err(SchedulerError::InsufficientConcurrency {
                concurrency: 2,
                active_queues: 6
            })
        ));
    }

    #[test]
    fn test_total_never_exceeds_concurrency() {
        for concurrency in 6..40 {
            let allocation = allocate_workers(concurrency, &default_queues()).unwrap();
            assert_eq!(allocation.values().sum::<usize>(), concurrency);
        }
    }

    #[test]
    fn test_no_active_queues() {
        let allocation =
            allocate_workers(5, &queues(&[(QueueName::EmailPolling, 0)])).unwrap();
        assert_eq!(allocation[&QueueName::EmailPolling], 0);
    }
}
