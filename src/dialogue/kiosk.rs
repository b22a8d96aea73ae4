//! 点餐对话状态机
//!
//! 每轮优先级：
//! 1. 有待填选项时，先尝试把整句当作该选项的回答
//! 2. 推荐请求（属性描述而非具体菜品）
//! 3. 解析菜品、数量、行内选项，查目录后加入购物车或追问必选项
//!
//! 同一时刻只有一个待填选项；目录失败时返回 ServiceUnavailable，购物车不变。

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::recommend::detect_recommendation;
use super::reply::{Notice, Reply, ReplyDetail, ReplyKind, Suggestion};
use super::slot::{slot_question, OptionInterpreter};
use super::state::{KioskState, LineItem, LineStatus, PendingSlot};
use super::utterance::{parse_order, OrderRequest};
use crate::catalog::{CatalogError, CatalogProvider, CatalogScope, MenuItem};
use crate::gateway::KioskContext;

const SERVICE_UNAVAILABLE_MESSAGE: &str = "처리를 완료하지 못했어요. 잠시 후 다시 시도해 주세요.";

pub struct KioskMachine {
    catalog: Arc<dyn CatalogProvider>,
    interpreter: Arc<dyn OptionInterpreter>,
    max_quantity: u32,
    recommendation_limit: usize,
    catalog_timeout: Duration,
}

impl KioskMachine {
    pub fn new(catalog: Arc<dyn CatalogProvider>, interpreter: Arc<dyn OptionInterpreter>) -> Self {
        Self {
            catalog,
            interpreter,
            max_quantity: 20,
            recommendation_limit: 3,
            catalog_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_quantity(mut self, max_quantity: u32) -> Self {
        self.max_quantity = max_quantity.max(1);
        self
    }

    pub fn with_recommendation_limit(mut self, limit: usize) -> Self {
        self.recommendation_limit = limit;
        self
    }

    pub fn with_catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = timeout;
        self
    }

    pub async fn process(
        &self,
        utterance: &str,
        ctx: &KioskContext,
        state: &KioskState,
    ) -> (Reply, KioskState) {
        let mut next = state.clone();
        next.scope = resolve_scope(ctx, state.scope.as_ref());

        match self.turn(utterance, &mut next).await {
            Ok(reply) => {
                debug_assert!(next.invariants_hold());
                let reply = reply.with_cart(&next.cart);
                (reply, next)
            }
            Err(e) => {
                tracing::warn!("catalog call failed: {}", e);
                let reply = Reply::failure(Notice::ServiceUnavailable, SERVICE_UNAVAILABLE_MESSAGE)
                    .with_cart(&state.cart);
                (reply, state.clone())
            }
        }
    }

    async fn turn(&self, utterance: &str, state: &mut KioskState) -> Result<Reply, CatalogError> {
        if let Some(slot) = state.pending_slot.clone() {
            if let Some(values) = self.interpreter.interpret_answer(utterance, &slot) {
                if let Some(reply) = fill_pending(state, &slot, &values) {
                    return Ok(reply);
                }
            }
        }

        if let Some(mut query) = detect_recommendation(utterance) {
            let Some(scope) = state.scope.clone() else {
                return Ok(missing_scope(utterance));
            };
            query.limit = self.recommendation_limit;
            let items = self.call(self.catalog.recommend(&scope, &query)).await?;
            let reply = if items.is_empty() {
                Reply::new(
                    ReplyKind::NotFound,
                    "말씀하신 조건에 맞는 메뉴를 찾지 못했어요. 다른 조건으로 말씀해 주세요.",
                )
                .with_detail(ReplyDetail::NotFound {
                    requested: utterance.trim().to_string(),
                })
            } else {
                recommendation_reply(&items)
            };
            return Ok(with_pending_reminder(reply, state));
        }

        let order = match parse_order(utterance, self.interpreter.as_ref(), self.max_quantity) {
            Ok(order) => order,
            Err(e) => {
                tracing::debug!("quantity rejected: {}", e);
                let reply = Reply::new(
                    ReplyKind::SlotQuestion,
                    format!(
                        "수량은 1개부터 {}개까지 숫자로 말씀해 주세요.",
                        self.max_quantity
                    ),
                )
                .with_detail(ReplyDetail::SlotQuestion {
                    item_id: None,
                    slot: "quantity".to_string(),
                    choices: Vec::new(),
                });
                return Ok(reply);
            }
        };

        if order.item_phrase.is_empty() {
            if let Some(slot) = state.pending_slot.clone() {
                amend_pending_line(state, &order);
                // 「아이스요 두 잔이요」：数量和待填选项一起给出
                if order.options.contains_key(&slot.option) {
                    if let Some(reply) = fill_pending(state, &slot, &order.options) {
                        return Ok(reply);
                    }
                }
                return Ok(ask_pending(state, None));
            }
            return Ok(Reply::new(ReplyKind::SlotQuestion, "어떤 메뉴로 도와드릴까요?").with_detail(
                ReplyDetail::SlotQuestion {
                    item_id: None,
                    slot: "item".to_string(),
                    choices: Vec::new(),
                },
            ));
        }

        let Some(scope) = state.scope.clone() else {
            return Ok(missing_scope(&order.item_phrase));
        };

        let found = self
            .call(self.catalog.find_by_name(&scope, &order.item_phrase))
            .await?;
        let Some(item) = found else {
            tracing::debug!(phrase = %order.item_phrase, "menu item not found");
            let reply = Reply::new(
                ReplyKind::NotFound,
                format!(
                    "'{}' 메뉴를 찾지 못했어요. 다른 메뉴를 선택해 주세요.",
                    order.item_phrase
                ),
            )
            .with_detail(ReplyDetail::NotFound {
                requested: order.item_phrase.clone(),
            });
            return Ok(with_pending_reminder(reply, state));
        };

        let mut line = new_line(&item, &order);
        let missing: Vec<String> = line.missing_options().iter().map(|o| o.to_string()).collect();

        if missing.is_empty() {
            line.status = LineStatus::Confirmed;
            let reply = confirmation(&line);
            state.cart.push(line);
            return Ok(with_pending_reminder(reply, state));
        }

        if state.pending_slot.is_some() {
            // 已有待填选项时不再开新问题
            let note = format!("{} 주문 전에 먼저 앞의 메뉴 옵션을 선택해 주세요.", item.display_name);
            return Ok(ask_pending(state, Some(note)));
        }

        let option = missing[0].clone();
        let choices = line.choices_for(&option);
        let message = format!("{}, {}", line.display_name, slot_question(&option, &choices));
        let reply = Reply::new(ReplyKind::SlotQuestion, message).with_detail(ReplyDetail::SlotQuestion {
            item_id: Some(line.item_id.clone()),
            slot: option.clone(),
            choices: choices.clone(),
        });
        state.cart.push(line);
        state.pending_slot = Some(PendingSlot {
            line_index: state.cart.len() - 1,
            option,
            choices,
        });
        Ok(reply)
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<T, CatalogError> {
        tokio::time::timeout(self.catalog_timeout, fut)
            .await
            .map_err(|_| {
                CatalogError::Unavailable(format!("timed out after {:?}", self.catalog_timeout))
            })?
    }
}

/// 本轮 meta 给出 kiosk_type 时以 meta 为准，否则沿用会话记住的范围
fn resolve_scope(ctx: &KioskContext, remembered: Option<&CatalogScope>) -> Option<CatalogScope> {
    match (&ctx.kiosk_type, remembered) {
        (Some(kiosk_type), _) => Some(CatalogScope::new(ctx.store_id.as_deref(), kiosk_type)),
        (None, Some(scope)) => {
            let mut scope = scope.clone();
            if ctx.store_id.is_some() {
                scope.store_id = ctx.store_id.clone();
            }
            Some(scope)
        }
        (None, None) => None,
    }
}

fn new_line(item: &MenuItem, order: &OrderRequest) -> LineItem {
    let mut options = BTreeMap::new();
    for (name, value) in &order.options {
        let valid = item
            .option_group(name)
            .map_or(false, |g| g.values.iter().any(|v| v == value));
        if valid {
            options.insert(name.clone(), value.clone());
        }
    }
    // 默认值只用于非必选组
    for group in &item.option_groups {
        if item.is_required(&group.name) || options.contains_key(&group.name) {
            continue;
        }
        if let Some(default) = &group.default {
            options.insert(group.name.clone(), default.clone());
        }
    }

    let option_choices = item
        .required_options
        .iter()
        .filter_map(|name| {
            item.option_group(name)
                .map(|g| (name.clone(), g.values.clone()))
        })
        .collect();

    LineItem {
        item_id: item.item_id.clone(),
        display_name: item.display_name.clone(),
        options,
        quantity: order.quantity.unwrap_or_else(|| item.default_quantity()),
        status: LineStatus::AwaitingOptions,
        required_options: item.required_options.clone(),
        option_choices,
        unit_price: item.price,
    }
}

/// 把回答写入目标行；目标行不存在时清掉待填选项并返回 None
fn fill_pending(
    state: &mut KioskState,
    slot: &PendingSlot,
    values: &BTreeMap<String, String>,
) -> Option<Reply> {
    let Some(line) = state.cart.get_mut(slot.line_index) else {
        tracing::warn!(index = slot.line_index, "pending slot points past the cart");
        state.pending_slot = None;
        return None;
    };

    let missing: Vec<String> = line.missing_options().iter().map(|o| o.to_string()).collect();
    for (name, value) in values {
        if (name == &slot.option || missing.contains(name)) && line.accepts(name, value) {
            line.options.insert(name.clone(), value.clone());
        }
    }

    let still_missing = line.missing_options().first().map(|o| o.to_string());
    match still_missing {
        None => {
            line.status = LineStatus::Confirmed;
            let reply = confirmation(line);
            state.pending_slot = None;
            Some(reply)
        }
        Some(option) => {
            let choices = line.choices_for(&option);
            let reply = Reply::new(ReplyKind::SlotQuestion, slot_question(&option, &choices))
                .with_detail(ReplyDetail::SlotQuestion {
                    item_id: Some(line.item_id.clone()),
                    slot: option.clone(),
                    choices: choices.clone(),
                });
            state.pending_slot = Some(PendingSlot {
                line_index: slot.line_index,
                option,
                choices,
            });
            Some(reply)
        }
    }
}

/// 「두 잔으로 해 주세요」「라지로요」这类没有菜名的补充，作用到待填行
fn amend_pending_line(state: &mut KioskState, order: &OrderRequest) {
    let Some(index) = state.pending_slot.as_ref().map(|s| s.line_index) else {
        return;
    };
    if let Some(line) = state.cart.get_mut(index) {
        if let Some(quantity) = order.quantity {
            line.quantity = quantity;
        }
        let missing: Vec<String> = line.missing_options().iter().map(|o| o.to_string()).collect();
        for (name, value) in &order.options {
            let is_pending = state
                .pending_slot
                .as_ref()
                .map_or(false, |s| &s.option == name);
            // 待填项由 fill_pending 写入，这里只补其他缺项
            if !is_pending && missing.contains(name) && line.accepts(name, value) {
                line.options.insert(name.clone(), value.clone());
            }
        }
    }
}

/// 重新询问当前待填选项
fn ask_pending(state: &KioskState, note: Option<String>) -> Reply {
    let Some(slot) = &state.pending_slot else {
        return Reply::new(ReplyKind::SlotQuestion, "어떤 메뉴로 도와드릴까요?");
    };
    let item_id = state.cart.get(slot.line_index).map(|l| l.item_id.clone());
    let question = slot_question(&slot.option, &slot.choices);
    let message = match note {
        Some(note) => format!("{} {}", note, question),
        None => question,
    };
    Reply::new(ReplyKind::SlotQuestion, message).with_detail(ReplyDetail::SlotQuestion {
        item_id,
        slot: slot.option.clone(),
        choices: slot.choices.clone(),
    })
}

/// 仍有待填选项时，在回复末尾提醒一次
fn with_pending_reminder(mut reply: Reply, state: &KioskState) -> Reply {
    if let Some(slot) = &state.pending_slot {
        let name = state
            .cart
            .get(slot.line_index)
            .map(|l| l.display_name.as_str())
            .unwrap_or("");
        reply.message = format!(
            "{} ({} 옵션: {})",
            reply.message,
            name,
            slot_question(&slot.option, &slot.choices)
        );
    }
    reply
}

fn confirmation(line: &LineItem) -> Reply {
    Reply::new(
        ReplyKind::OrderConfirmation,
        format!("{} {}개를 장바구니에 담았어요.", line.display_name, line.quantity),
    )
    .with_detail(ReplyDetail::OrderConfirmation {
        item_id: line.item_id.clone(),
        quantity: line.quantity,
        options: line.options.clone(),
    })
}

fn missing_scope(requested: &str) -> Reply {
    Reply::new(
        ReplyKind::NotFound,
        "메뉴 정보를 확인하지 못했어요. 매장 정보를 확인해 주세요.",
    )
    .with_detail(ReplyDetail::NotFound {
        requested: requested.trim().to_string(),
    })
}

fn recommendation_reply(items: &[MenuItem]) -> Reply {
    let listed: Vec<String> = items
        .iter()
        .map(|i| format!("{}({})", i.display_name, format_price(i.price)))
        .collect();
    Reply::new(
        ReplyKind::Recommendation,
        format!("이런 메뉴는 어떠세요? {}", listed.join(", ")),
    )
    .with_detail(ReplyDetail::Recommendation {
        items: items
            .iter()
            .map(|i| Suggestion {
                item_id: i.item_id.clone(),
                display_name: i.display_name.clone(),
                price: i.price,
            })
            .collect(),
    })
}

/// 5900 → "5,900원"
fn format_price(price: u32) -> String {
    let digits = price.to_string();
    let mut out = String::with_capacity(digits.len() + 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push('원');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::catalog::{InMemoryCatalog, RecommendationQuery};
    use crate::dialogue::KeywordOptionInterpreter;

    fn machine() -> KioskMachine {
        KioskMachine::new(
            Arc::new(InMemoryCatalog::demo()),
            Arc::new(KeywordOptionInterpreter::new()),
        )
    }

    fn cafe() -> KioskContext {
        KioskContext {
            store_id: Some("store-1".into()),
            kiosk_type: Some("cafe".into()),
        }
    }

    struct DownCatalog;

    #[async_trait]
    impl CatalogProvider for DownCatalog {
        async fn find_by_name(
            &self,
            _scope: &CatalogScope,
            _phrase: &str,
        ) -> Result<Option<MenuItem>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".into()))
        }

        async fn recommend(
            &self,
            _scope: &CatalogScope,
            _query: &RecommendationQuery,
        ) -> Result<Vec<MenuItem>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_missing_required_option_is_asked() {
        let m = machine();
        let (reply, state) = m.process("아메리카노 주세요", &cafe(), &KioskState::default()).await;
        assert_eq!(reply.kind, ReplyKind::SlotQuestion);
        assert_eq!(reply.message, "아메리카노, 뜨거운/아이스 중 어떤 걸로 드릴까요?");
        assert_eq!(state.cart.len(), 1);
        assert_eq!(state.cart[0].status, LineStatus::AwaitingOptions);
        assert_eq!(state.cart[0].options.get("size").map(String::as_str), Some("M"));
        assert_eq!(state.pending_slot.as_ref().map(|s| s.option.as_str()), Some("temperature"));
        assert!(state.invariants_hold());

        let (reply, state) = m.process("아이스로요", &cafe(), &state).await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(reply.message, "아메리카노 1개를 장바구니에 담았어요.");
        assert_eq!(state.cart[0].status, LineStatus::Confirmed);
        assert_eq!(state.cart[0].options["temperature"], "iced");
        assert!(state.pending_slot.is_none());
        assert_eq!(reply.cart.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_quantity_without_required_options() {
        let (reply, state) = machine()
            .process("라떼 두 잔 주세요", &cafe(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(state.cart[0].item_id, "cafe:cafe_latte");
        assert_eq!(state.cart[0].quantity, 2);
        assert_eq!(state.cart[0].status, LineStatus::Confirmed);
        assert_eq!(state.total_price(), 10_000);
    }

    #[tokio::test]
    async fn test_particles_and_fillers_still_resolve() {
        let m = machine();
        for (utterance, quantity) in [("라떼 2잔이요", 2), ("라떼 하나요", 1), ("라떼요", 1)] {
            let (reply, state) = m.process(utterance, &cafe(), &KioskState::default()).await;
            assert_eq!(reply.kind, ReplyKind::OrderConfirmation, "{}", utterance);
            assert_eq!(state.cart[0].item_id, "cafe:cafe_latte");
            assert_eq!(state.cart[0].quantity, quantity);
        }

        let (reply, state) = m
            .process("아메리카노 아이스 걸로 주세요", &cafe(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(state.cart[0].options["temperature"], "iced");

        let (reply, state) = m
            .process("아메리카노 두 잔이요", &cafe(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::SlotQuestion);
        assert_eq!(state.cart[0].quantity, 2);
        assert_eq!(state.cart[0].status, LineStatus::AwaitingOptions);
    }

    #[tokio::test]
    async fn test_pending_line_takes_quantity_and_option() {
        let m = machine();
        let (_, pending) = m.process("아메리카노 주세요", &cafe(), &KioskState::default()).await;

        let (reply, state) = m.process("두 잔으로 해 주세요", &cafe(), &pending).await;
        assert_eq!(reply.kind, ReplyKind::SlotQuestion);
        assert_eq!(state.cart.len(), 1);
        assert_eq!(state.cart[0].quantity, 2);
        assert_eq!(state.pending_slot, pending.pending_slot);

        let (reply, state) = m.process("아이스요 두 잔이요", &cafe(), &pending).await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(reply.message, "아메리카노 2개를 장바구니에 담았어요.");
        assert_eq!(state.cart[0].options["temperature"], "iced");
        assert!(state.pending_slot.is_none());
        assert!(state.invariants_hold());
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let before = KioskState::default();
        let (reply, state) = machine().process("콜드브루 말차 주세요", &cafe(), &before).await;
        assert_eq!(reply.kind, ReplyKind::NotFound);
        assert_eq!(
            reply.detail,
            Some(ReplyDetail::NotFound {
                requested: "콜드브루 말차".into()
            })
        );
        assert!(state.cart.is_empty());
    }

    #[tokio::test]
    async fn test_two_required_options_are_asked_in_order() {
        let m = machine();
        let (reply, state) = m.process("바닐라라떼 주세요", &cafe(), &KioskState::default()).await;
        assert!(reply.message.contains("뜨거운/아이스"));
        assert!(!reply.message.contains("사이즈"));

        let (reply, state) = m.process("따뜻한 걸로요", &cafe(), &state).await;
        assert_eq!(reply.kind, ReplyKind::SlotQuestion);
        assert_eq!(reply.message, "사이즈는 어떤 걸로 드릴까요? (S/M/L)");
        assert_eq!(state.pending_slot.as_ref().map(|s| s.option.as_str()), Some("size"));
        assert!(state.invariants_hold());

        let (reply, state) = m.process("라지요", &cafe(), &state).await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(state.cart[0].options["size"], "L");
        assert_eq!(state.cart[0].options["temperature"], "hot");
    }

    #[tokio::test]
    async fn test_all_options_in_one_utterance() {
        let (reply, state) = machine()
            .process("아이스 바닐라라떼 라지 주세요", &cafe(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert!(state.pending_slot.is_none());
        assert_eq!(state.cart[0].status, LineStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_second_item_needing_options_waits() {
        let m = machine();
        let (_, state) = m.process("아메리카노 주세요", &cafe(), &KioskState::default()).await;
        let (reply, next) = m.process("녹차 주세요", &cafe(), &state).await;
        assert_eq!(reply.kind, ReplyKind::SlotQuestion);
        assert!(reply.message.starts_with("녹차 주문 전에"));
        assert_eq!(next.cart.len(), 1);
        assert_eq!(next.pending_slot, state.pending_slot);

        // 不需要选项的新菜品可以直接加入
        let (reply, next) = m.process("치즈케이크 하나 주세요", &cafe(), &next).await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(next.cart.len(), 2);
        assert!(next.pending_slot.is_some());
        assert!(next.invariants_hold());
    }

    #[tokio::test]
    async fn test_recommendation_does_not_touch_cart() {
        let (reply, state) = machine()
            .process("달달한 거 추천해 주세요", &cafe(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::Recommendation);
        assert!(reply.message.starts_with("이런 메뉴는 어떠세요? 카라멜마키아또(5,900원)"));
        assert!(state.cart.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_quantity_reprompts() {
        let (reply, state) = machine()
            .process("라떼 0잔 주세요", &cafe(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::SlotQuestion);
        assert_eq!(
            reply.detail,
            Some(ReplyDetail::SlotQuestion {
                item_id: None,
                slot: "quantity".into(),
                choices: vec![],
            })
        );
        assert!(state.cart.is_empty());
    }

    #[tokio::test]
    async fn test_scope_is_remembered() {
        let m = machine();
        let (_, state) = m.process("라떼 주세요", &cafe(), &KioskState::default()).await;
        let (reply, state) = m
            .process("치즈케이크 주세요", &KioskContext::default(), &state)
            .await;
        assert_eq!(reply.kind, ReplyKind::OrderConfirmation);
        assert_eq!(state.cart.len(), 2);

        let (reply, _) = m
            .process("라떼 주세요", &KioskContext::default(), &KioskState::default())
            .await;
        assert_eq!(reply.kind, ReplyKind::NotFound);
    }

    #[tokio::test]
    async fn test_catalog_failure_keeps_state() {
        let m = KioskMachine::new(Arc::new(DownCatalog), Arc::new(KeywordOptionInterpreter::new()));
        let before = KioskState::default();
        let (reply, state) = m.process("아메리카노 주세요", &cafe(), &before).await;
        assert!(reply.is_failure());
        assert_eq!(reply.notice(), Some(Notice::ServiceUnavailable));
        assert_eq!(state, before);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(500), "500원");
        assert_eq!(format_price(5900), "5,900원");
        assert_eq!(format_price(1234567), "1,234,567원");
    }
}
