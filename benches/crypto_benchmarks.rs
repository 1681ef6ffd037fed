use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hybrid_chat::{
    core::crypto::arith::{is_prime, mod_exp},
    BlockCipher, ChatConfig, Handshake, KeyPair, SecureChannel, SymmetricKey,
};

fn benchmark_block_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_cipher");
    let des = BlockCipher::new(SymmetricKey::new(*b"Luhaozhe"));

    group.bench_function("key_schedule", |b| {
        b.iter(|| black_box(BlockCipher::new(SymmetricKey::new(black_box(*b"Luhaozhe")))));
    });

    group.bench_function("encrypt_block", |b| {
        let block = [0x42u8; 8];
        b.iter(|| black_box(des.encrypt_block(black_box(&block))));
    });

    for size in [8usize, 64, 511] {
        let data = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt_buffer", size), &data, |b, data| {
            b.iter(|| black_box(des.encrypt_buffer(black_box(data))));
        });

        let ciphertext = des.encrypt_buffer(&data);
        group.bench_with_input(BenchmarkId::new("decrypt_buffer", size), &ciphertext, |b, ciphertext| {
            b.iter(|| black_box(des.decrypt_buffer(black_box(ciphertext)).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_key_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_pair");
    group.sample_size(20);

    group.bench_function("generate", |b| {
        b.iter(|| black_box(KeyPair::generate().unwrap()));
    });

    group.bench_function("miller_rabin_prime", |b| {
        b.iter(|| black_box(is_prime(black_box(4_294_967_291))));
    });

    let pair = KeyPair::generate().unwrap();
    group.bench_function("encrypt_byte", |b| {
        b.iter(|| black_box(pair.encrypt(black_box(0x4C))));
    });
    group.bench_function("decrypt_byte", |b| {
        let ciphertext = pair.encrypt(0x4C);
        b.iter(|| black_box(pair.decrypt(black_box(ciphertext))));
    });
    group.bench_function("mod_exp_64", |b| {
        b.iter(|| black_box(mod_exp(black_box(0x1234_5678), black_box(u64::MAX - 2), black_box(u64::MAX - 58))));
    });

    group.finish();
}

fn benchmark_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");

    group.bench_function("session_key_exchange", |b| {
        b.iter_with_setup(
            || {
                let mut responder = Handshake::responder(ChatConfig::default());
                responder.install_key_pair(KeyPair::generate().unwrap()).unwrap();
                responder
            },
            |mut responder| {
                let mut initiator = Handshake::initiator(ChatConfig::default());
                initiator.receive_public_key(&responder.public_key_record().unwrap()).unwrap();
                let record = initiator.encrypt_session_key().unwrap();
                initiator.mark_sent().unwrap();
                responder.accept_session_key(&record).unwrap();
                black_box(responder.into_channel().unwrap());
            },
        );
    });

    let channel = SecureChannel::with_key(SymmetricKey::new(*b"Luhaozhe"));
    group.bench_function("seal_open", |b| {
        b.iter(|| {
            let record = channel.seal(black_box(b"hello")).unwrap();
            black_box(channel.open(&record).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_block_cipher, benchmark_key_pair, benchmark_handshake);
criterion_main!(benches);
