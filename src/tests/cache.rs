use crate::cache::{Cache, InMemoryCache, NoCache};
use crate::context::Context;
use crate::thunk::Thunk;

type TestCache = InMemoryCache<String, String, String>;

fn resolved(value: &str) -> Thunk<String, String> {
	Thunk::resolved(value.to_owned())
}

#[tokio::test]
async fn test_in_memory_cache_set_then_get() {
	let cache = TestCache::new();
	let ctx = Context::background();

	assert!(cache.get(&ctx, &"a".to_owned()).is_none());

	cache.set(&ctx, "a".to_owned(), resolved("1"));

	let thunk = cache.get(&ctx, &"a".to_owned()).expect("entry should exist");
	assert_eq!(thunk.get().await, Ok("1".to_owned()));
}

#[tokio::test]
async fn test_in_memory_cache_set_overwrites() {
	let cache = TestCache::new();
	let ctx = Context::background();

	cache.set(&ctx, "a".to_owned(), resolved("1"));
	cache.set(&ctx, "a".to_owned(), resolved("2"));

	let thunk = cache.get(&ctx, &"a".to_owned()).expect("entry should exist");
	assert_eq!(thunk.get().await, Ok("2".to_owned()));
}

#[tokio::test]
async fn test_in_memory_cache_delete() {
	let cache = TestCache::new();
	let ctx = Context::background();

	cache.set(&ctx, "a".to_owned(), resolved("1"));

	assert!(cache.delete(&ctx, &"a".to_owned()));
	assert!(!cache.delete(&ctx, &"a".to_owned()));
	assert!(cache.get(&ctx, &"a".to_owned()).is_none());
}

#[tokio::test]
async fn test_in_memory_cache_clear() {
	let cache = TestCache::new();
	let ctx = Context::background();

	cache.set(&ctx, "a".to_owned(), resolved("1"));
	cache.set(&ctx, "b".to_owned(), resolved("2"));

	cache.clear();

	assert!(cache.get(&ctx, &"a".to_owned()).is_none());
	assert!(cache.get(&ctx, &"b".to_owned()).is_none());
}

#[tokio::test]
async fn test_no_cache_is_all_noops() {
	let cache = NoCache;
	let ctx = Context::background();

	Cache::<String, String, String>::set(&cache, &ctx, "a".to_owned(), resolved("1"));

	assert!(Cache::<String, String, String>::get(&cache, &ctx, &"a".to_owned()).is_none());
	assert!(!Cache::<String, String, String>::delete(&cache, &ctx, &"a".to_owned()));
	Cache::<String, String, String>::clear(&cache);
}
