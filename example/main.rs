//! Chain timer driven deferred values, then subscribe late to an already settled one.
use deferred::{
    Deferred, Resolution,
    tokio::{fulfill_after, reject_after},
};
use std::time::Duration;
use tokio::runtime::{Builder, Handle};

const TICK: Duration = Duration::from_millis(200);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let rt = Builder::new_current_thread().enable_time().build()?;
    let handle = rt.handle().clone();

    let p1 = fulfill_after::<String, String>(&handle, TICK, "my value".into());

    let h = handle.clone();
    let end = p1
        .and_then(move |v| {
            println!("{v}");
            fulfill_after(&h, TICK, "another value".to_owned())
        })
        .and_then(with(&handle, |h, v| {
            println!("{v}");
            fulfill_after(h, TICK, "a final value".to_owned())
        }))
        .and_then(with(&handle, |h, v| {
            println!("{v}");
            reject_after::<String, String>(h, TICK, "something broke".to_owned())
        }))
        .catch(|r| {
            println!("{r}");
            Resolution::Fulfill(r)
        });

    rt.block_on(async {
        end.wait().await?;

        tokio::time::sleep(TICK).await;
        println!("{p1:?}");

        let late = late_subscriber(&p1, &handle);
        let v = late.await?;
        println!("{v}");

        Ok::<_, String>(())
    })?;

    Ok(())
}

fn with<F>(handle: &Handle, f: F) -> impl FnOnce(String) -> Deferred<String, String> + Send + 'static
where
    F: FnOnce(&Handle, String) -> Deferred<String, String> + Send + 'static,
{
    let handle = handle.clone();
    move |v| f(&handle, v)
}

fn late_subscriber(p1: &Deferred<String, String>, handle: &Handle) -> Deferred<String, String> {
    let handle = handle.clone();
    p1.and_then(move |_| {
        fulfill_after(
            &handle,
            TICK,
            "a value from a deferred added after p1 is fulfilled".to_owned(),
        )
    })
}
