//! Record-replay round-trip integration tests.
//!
//! A small checkout talks to two collaborators. The tests record a run
//! against live fakes, replay it from the produced text, and walk through
//! the approval workflow of the spec store.

use std::sync::Arc;

use callspec::{
    CallspecConfig, Capability, IdentityRegistry, MethodDescriptor, ParamDescriptor, Proxy,
    Result, SpecCase, SpecError, SpecSession,
};

// --- Capabilities -----------------------------------------------------------

trait Inventory: Send + Sync {
    fn check_stock(&self, product_id: &str, quantity: u32) -> Result<bool>;
    fn reserve(&self, sku: &str, ticket: &mut Option<String>) -> Result<bool>;
}

impl Capability for dyn Inventory {
    const NAME: &'static str = "Inventory";
    const METHODS: &'static [MethodDescriptor] = &[
        MethodDescriptor::new(
            "CheckStock",
            &[ParamDescriptor::input("productId"), ParamDescriptor::input("quantity")],
            true,
        ),
        MethodDescriptor::new(
            "Reserve",
            &[ParamDescriptor::input("sku"), ParamDescriptor::inout("ticket")],
            true,
        ),
    ];
}

impl Inventory for Proxy<dyn Inventory> {
    fn check_stock(&self, product_id: &str, quantity: u32) -> Result<bool> {
        let mut call =
            self.call("CheckStock")?.arg("productId", product_id)?.arg("quantity", &quantity)?;
        let in_stock = call.execute(|live| live.check_stock(product_id, quantity))?;
        call.finish()?;
        Ok(in_stock)
    }

    fn reserve(&self, sku: &str, ticket: &mut Option<String>) -> Result<bool> {
        let mut call = self.call("Reserve")?.arg("sku", sku)?.arg("ticket", &*ticket)?;
        let reserved = call.execute(|live| live.reserve(sku, ticket))?;
        call.output("ticket", ticket)?;
        call.finish()?;
        Ok(reserved)
    }
}

trait Receipt: Send + Sync {}

trait Payments: Send + Sync {
    fn charge(&self, amount: f64) -> Result<Arc<dyn Receipt>>;
    fn archive(&self, receipt: &Arc<dyn Receipt>) -> Result<()>;
}

impl Capability for dyn Payments {
    const NAME: &'static str = "Payments";
    const METHODS: &'static [MethodDescriptor] = &[
        MethodDescriptor::new("Charge", &[ParamDescriptor::input("amount")], true),
        MethodDescriptor::new("Archive", &[ParamDescriptor::input("receipt")], false),
    ];
}

impl Payments for Proxy<dyn Payments> {
    fn charge(&self, amount: f64) -> Result<Arc<dyn Receipt>> {
        let mut call = self.call("Charge")?.arg("amount", &amount)?;
        let receipt = call.execute(|live| live.charge(amount))?;
        call.finish()?;
        Ok(receipt)
    }

    fn archive(&self, receipt: &Arc<dyn Receipt>) -> Result<()> {
        let mut call = self.call("Archive")?.arg("receipt", receipt)?;
        call.execute(|live| live.archive(receipt))?;
        call.finish()
    }
}

// --- Live fakes -------------------------------------------------------------

struct Warehouse;

impl Inventory for Warehouse {
    fn check_stock(&self, _product_id: &str, quantity: u32) -> Result<bool> {
        Ok(quantity <= 5)
    }

    fn reserve(&self, sku: &str, ticket: &mut Option<String>) -> Result<bool> {
        *ticket = Some(format!("T-{sku}"));
        Ok(true)
    }
}

struct PaperReceipt;

impl Receipt for PaperReceipt {}

struct Till {
    receipt: Arc<dyn Receipt>,
}

impl Payments for Till {
    fn charge(&self, _amount: f64) -> Result<Arc<dyn Receipt>> {
        Ok(Arc::clone(&self.receipt))
    }

    fn archive(&self, _receipt: &Arc<dyn Receipt>) -> Result<()> {
        Ok(())
    }
}

struct DecliningTill;

impl Payments for DecliningTill {
    fn charge(&self, _amount: f64) -> Result<Arc<dyn Receipt>> {
        Err(SpecError::Capability("card <id: 4411 declined, holder <unknown:Card>".to_string()))
    }

    fn archive(&self, _receipt: &Arc<dyn Receipt>) -> Result<()> {
        Ok(())
    }
}

// --- Unit under test --------------------------------------------------------

struct Checkout {
    inventory: Arc<dyn Inventory>,
    payments: Arc<dyn Payments>,
}

impl Checkout {
    fn place_order(&self, sku: &str, quantity: u32, unit_price: f64) -> Result<Option<String>> {
        if !self.inventory.check_stock(sku, quantity)? {
            return Ok(None);
        }
        let mut ticket = None;
        if !self.inventory.reserve(sku, &mut ticket)? {
            return Ok(None);
        }
        let receipt = self.payments.charge(f64::from(quantity) * unit_price)?;
        self.payments.archive(&receipt)?;
        Ok(ticket)
    }
}

const RECORDED: &str = "\
📋 <Test Inputs>
  🔸 sku: \"P1\"
  🔸 quantity: 2

🔧 Inventory constructor called with:
  🔸 warehouse: \"W1\"

🔹 CheckStock:
  🔸 productId: \"P1\"
  🔸 quantity: 2
  🔹 Returns: True

🔹 Reserve:
  🔸 sku: \"P1\"
  🔸 ticket: null
  🔹 Returns: True
  🔹 ticket: \"T-P1\"

🔹 Charge:
  🔸 amount: 19
  🔹 Returns: <id:R1>

🔹 Archive:
  🔸 receipt: <id:R1>
";

fn registry_with_receipt() -> (Arc<IdentityRegistry>, Arc<dyn Receipt>) {
    let registry = Arc::new(IdentityRegistry::new());
    let receipt: Arc<dyn Receipt> = Arc::new(PaperReceipt);
    registry.register(&receipt, Some("R1")).unwrap();
    (registry, receipt)
}

#[test]
fn recording_captures_every_interaction() {
    let (registry, receipt) = registry_with_receipt();
    let session = Arc::new(SpecSession::empty(registry));
    session.record_input("sku", "P1").unwrap();
    session.record_input("quantity", &2_u32).unwrap();

    let inventory = Proxy::<dyn Inventory>::recording(Arc::new(Warehouse), Arc::clone(&session));
    inventory.constructed(&[("warehouse", &"W1")]).unwrap();
    let payments = Proxy::<dyn Payments>::recording(Arc::new(Till { receipt }), Arc::clone(&session));
    let checkout = Checkout { inventory: Arc::new(inventory), payments: Arc::new(payments) };

    let ticket = checkout.place_order("P1", 2, 9.5).unwrap();
    assert_eq!(ticket.as_deref(), Some("T-P1"));
    assert_eq!(session.text(), RECORDED);
}

#[test]
fn replaying_reproduces_the_recorded_run() {
    let (registry, _receipt) = registry_with_receipt();
    let session = Arc::new(SpecSession::new(RECORDED, registry).unwrap());
    let sku: String = session.input("sku").unwrap();
    let quantity: u32 = session.input("quantity").unwrap();

    let inventory = Proxy::<dyn Inventory>::replaying(Arc::clone(&session));
    inventory.constructed(&[("warehouse", &"W1")]).unwrap();
    let payments = Proxy::<dyn Payments>::replaying(Arc::clone(&session));
    let checkout = Checkout { inventory: Arc::new(inventory), payments: Arc::new(payments) };

    let ticket = checkout.place_order(&sku, quantity, 9.5).unwrap();
    assert_eq!(ticket.as_deref(), Some("T-P1"));
    assert_eq!(session.cursor(), 4);
    session.verify().unwrap();
}

#[test]
fn replay_without_the_registered_object_fails_to_resolve() {
    let session = Arc::new(SpecSession::new(RECORDED, Arc::new(IdentityRegistry::new())).unwrap());
    let payments = Proxy::<dyn Payments>::replaying(Arc::clone(&session));
    let inventory = Proxy::<dyn Inventory>::replaying(Arc::clone(&session));
    let checkout = Checkout { inventory: Arc::new(inventory), payments: Arc::new(payments) };

    let err = checkout.place_order("P1", 2, 9.5).unwrap_err();
    assert!(matches!(err, SpecError::Resolution { ref id, .. } if id == "R1"));
}

#[test]
fn declined_payment_is_recorded_and_replayed() {
    let session = Arc::new(SpecSession::empty(Arc::new(IdentityRegistry::new())));
    let inventory = Proxy::<dyn Inventory>::recording(Arc::new(Warehouse), Arc::clone(&session));
    let payments = Proxy::<dyn Payments>::recording(Arc::new(DecliningTill), Arc::clone(&session));
    let checkout = Checkout { inventory: Arc::new(inventory), payments: Arc::new(payments) };
    assert!(matches!(checkout.place_order("P1", 1, 4.0), Err(SpecError::Capability(_))));

    let recorded = session.text();
    assert!(recorded.ends_with(
        "🔹 Charge:\n  🔸 amount: 4\n  🔺 Exception: Capability error: card <id: 4411 declined, holder <unknown:Card>\n"
    ));

    let replayed = Arc::new(SpecSession::new(&recorded, Arc::new(IdentityRegistry::new())).unwrap());
    let inventory = Proxy::<dyn Inventory>::replaying(Arc::clone(&replayed));
    let payments = Proxy::<dyn Payments>::replaying(Arc::clone(&replayed));
    let checkout = Checkout { inventory: Arc::new(inventory), payments: Arc::new(payments) };
    let err = checkout.place_order("P1", 1, 4.0).unwrap_err();
    assert!(matches!(err, SpecError::RecordedFailure { ref method, .. } if method == "Charge"));
    replayed.verify().unwrap();
}

#[test]
fn changed_call_order_is_a_sequence_mismatch() {
    let (registry, _receipt) = registry_with_receipt();
    let session = Arc::new(SpecSession::new(RECORDED, registry).unwrap());
    let inventory = Proxy::<dyn Inventory>::replaying(Arc::clone(&session));

    let mut ticket = None;
    let err = inventory.reserve("P1", &mut ticket).unwrap_err();
    assert!(matches!(
        err,
        SpecError::SequenceMismatch { position: 0, ref expected, ref actual }
            if expected == "CheckStock" && actual == "Reserve"
    ));
    assert_eq!(session.cursor(), 0);
    assert!(inventory.check_stock("P1", 2).unwrap());
}

#[test]
fn approval_workflow_goes_from_missing_values_to_green() {
    let dir = tempfile::tempdir().unwrap();
    let config = CallspecConfig { spec_dir: dir.path().to_path_buf(), ..CallspecConfig::default() };
    let store = config.store();
    let case = SpecCase::new("Checkout", "rejects_large_orders");

    let run = || {
        let session = Arc::new(config.session(&case, Arc::new(IdentityRegistry::new())).unwrap());
        let inventory = Proxy::<dyn Inventory>::replaying(Arc::clone(&session));
        let payments = Proxy::<dyn Payments>::replaying(Arc::clone(&session));
        let checkout = Checkout { inventory: Arc::new(inventory), payments: Arc::new(payments) };
        let result = checkout.place_order("P9", 50, 1.0);
        (result, session)
    };

    let (result, session) = run();
    assert!(matches!(result, Err(SpecError::MissingValue { .. })));
    assert!(matches!(store.verify(&case, &session), Err(SpecError::Diverged { .. })));

    let received = std::fs::read_to_string(store.received_path(&case)).unwrap();
    assert_eq!(
        received,
        "🔹 CheckStock:\n  🔸 productId: \"P9\"\n  🔸 quantity: 50\n  🔹 Returns: <missing_value>\n"
    );
    std::fs::write(store.received_path(&case), received.replace("<missing_value>", "False")).unwrap();
    store.approve(&case).unwrap();

    let (result, session) = run();
    assert_eq!(result.unwrap(), None);
    store.verify(&case, &session).unwrap();
    assert!(!store.received_path(&case).exists());
}

#[test]
fn registry_synthesizes_replaying_collaborators() {
    let registry = Arc::new(IdentityRegistry::new());
    let session = Arc::new(
        SpecSession::new(
            "🔹 CheckStock:\n  🔸 productId: \"P1\"\n  🔸 quantity: 2\n  🔹 Returns: True\n",
            Arc::clone(&registry),
        )
        .unwrap(),
    );
    let replay_session = Arc::clone(&session);
    registry.set_auto::<dyn Inventory, _>(move || -> Arc<dyn Inventory> {
        Arc::new(Proxy::<dyn Inventory>::replaying(Arc::clone(&replay_session)))
    });

    let inventory = registry.dispense::<dyn Inventory>().unwrap().unwrap();
    assert_eq!(registry.id_of(&inventory).as_deref(), Some("Inventory_1"));
    assert!(inventory.check_stock("P1", 2).unwrap());
    session.verify().unwrap();
}
