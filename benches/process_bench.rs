use criterion::{criterion_group, criterion_main, Criterion};
use nix::{
   libc,
   sys::wait::waitpid,
   unistd::{fork, ForkResult},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use spsc_ring::{channel, SharedMapping, SpscQueue, SpscRing};

const RING_CAP: usize = 1024;
const ITERS:     usize = 1_000_000;

// Producer/consumer hand-shake states kept in a separate shared page.
const CHILD_READY:  u32 = 1;
const PARENT_READY: u32 = 2;
const CHILD_DONE:   u32 = 3;

// Ring in a MAP_SHARED region, producer in a forked child.
fn bench_ring_process(c: &mut Criterion) {
   c.bench_function("SpscRing (process)", |b| {
      b.iter_custom(|iters| {
         let mut total = Duration::ZERO;
         for _ in 0..iters {
            let bytes = SpscRing::<usize>::shared_size(RING_CAP);
            let map = SharedMapping::anonymous(bytes).expect("mmap ring");
            let q = unsafe { SpscRing::init_in_shared(map.as_mut_ptr(), RING_CAP) };
            total += fork_and_run(q);
            drop(map);
         }
         total
      })
   });
}

// Same ring, two threads in one process, through the typed endpoints.
fn bench_ring_threads(c: &mut Criterion) {
   c.bench_function("SpscRing (threads)", |b| {
      b.iter_custom(|iters| {
         let mut total = Duration::ZERO;
         for _ in 0..iters {
            let (mut tx, mut rx) = channel::<usize>(RING_CAP);
            let start = Instant::now();
            let producer = thread::spawn(move || {
               for i in 0..ITERS {
                  let mut item = i;
                  while let Err(err) = tx.push(item) {
                     item = err.into_inner();
                     std::hint::spin_loop();
                  }
               }
            });
            let mut consumed = 0;
            while consumed < ITERS {
               if rx.pop().is_ok() {
                  consumed += 1;
               } else {
                  std::hint::spin_loop();
               }
            }
            producer.join().expect("producer panicked");
            total += start.elapsed();
         }
         total
      })
   });
}

fn fork_and_run<Q>(q: &'static Q) -> Duration
where
   Q: SpscQueue<usize> + Sync,
{
   let sync_map = SharedMapping::anonymous(std::mem::size_of::<AtomicU32>()).expect("mmap sync page");
   let sync_flag = unsafe { &*(sync_map.as_mut_ptr() as *const AtomicU32) };
   sync_flag.store(0, Ordering::Relaxed);

   match unsafe { fork() }.expect("fork failed") {
      ForkResult::Child => {
         sync_flag.store(CHILD_READY, Ordering::Release);
         while sync_flag.load(Ordering::Acquire) < PARENT_READY {
            std::hint::spin_loop();
         }

         for i in 0..ITERS {
            while q.push(i).is_err() {
               std::hint::spin_loop();
            }
         }

         sync_flag.store(CHILD_DONE, Ordering::Release);
         unsafe { libc::_exit(0) };
      }
      ForkResult::Parent { child } => {
         while sync_flag.load(Ordering::Acquire) < CHILD_READY {
            std::hint::spin_loop();
         }
         sync_flag.store(PARENT_READY, Ordering::Release);

         let start = Instant::now();
         let mut consumed = 0;
         while consumed < ITERS {
            if q.pop().is_ok() {
               consumed += 1;
            } else {
               std::hint::spin_loop();
            }
         }
         let duration = start.elapsed();

         while sync_flag.load(Ordering::Acquire) != CHILD_DONE {
            std::hint::spin_loop();
         }
         waitpid(child, None).expect("waitpid failed");
         duration
      }
   }
}

fn custom_criterion() -> Criterion {
   Criterion::default()
      .warm_up_time(Duration::from_secs(5))
      .measurement_time(Duration::from_secs(20))
      .sample_size(50)
}

criterion_group!{
   name = benches;
   config = custom_criterion();
   targets =
      bench_ring_process,
      bench_ring_threads,
}
criterion_main!(benches);
